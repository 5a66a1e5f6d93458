//! Identifiers of the built-in issue codes.
//!
//! Checkers refer to codes through these constants only; `ALL` lists every
//! one of them so the catalog can be validated when it is loaded.

pub const UNTAGGED_IMAGE: u16 = 100;
pub const LATEST_IMAGE: u16 = 101;
pub const NO_PROBES: u16 = 102;
pub const NO_LIVENESS_PROBE: u16 = 103;
pub const NO_READINESS_PROBE: u16 = 104;
pub const NUMERIC_PROBE_PORT: u16 = 105;
pub const NO_RESOURCES: u16 = 106;
pub const NO_LIMITS: u16 = 107;
pub const UNNAMED_PORT: u16 = 108;

pub const POD_NOT_READY: u16 = 204;
pub const POD_RESTARTED: u16 = 205;
pub const POD_UNHAPPY_PHASE: u16 = 207;

pub const DEFAULT_SERVICE_ACCOUNT: u16 = 300;
pub const TOKEN_MOUNTED: u16 = 301;
pub const POD_RUNS_AS_ROOT: u16 = 302;
pub const MISSING_SECRET: u16 = 304;
pub const MISSING_PULL_SECRET: u16 = 305;
pub const CONTAINER_RUNS_AS_ROOT: u16 = 306;
pub const MISSING_SERVICE_ACCOUNT: u16 = 307;

pub const UNUSED: u16 = 400;
pub const UNUSED_KEY: u16 = 401;

pub const ZERO_SCALE: u16 = 500;
pub const UNHEALTHY_REPLICAS: u16 = 501;
pub const CPU_UNDER_ALLOCATED: u16 = 503;
pub const CPU_OVER_ALLOCATED: u16 = 504;
pub const MEM_UNDER_ALLOCATED: u16 = 505;
pub const MEM_OVER_ALLOCATED: u16 = 506;

pub const HPA_MISSING_DEPLOYMENT: u16 = 600;
pub const HPA_MISSING_STATEFULSET: u16 = 601;
pub const HPA_CPU_BURST: u16 = 602;
pub const HPA_MEM_BURST: u16 = 603;

pub const NAMESPACE_INACTIVE: u16 = 800;

pub const MISSING_BINDING_TARGET: u16 = 1300;

/// Every code a checker may emit.
pub const ALL: &[u16] = &[
    UNTAGGED_IMAGE,
    LATEST_IMAGE,
    NO_PROBES,
    NO_LIVENESS_PROBE,
    NO_READINESS_PROBE,
    NUMERIC_PROBE_PORT,
    NO_RESOURCES,
    NO_LIMITS,
    UNNAMED_PORT,
    POD_NOT_READY,
    POD_RESTARTED,
    POD_UNHAPPY_PHASE,
    DEFAULT_SERVICE_ACCOUNT,
    TOKEN_MOUNTED,
    POD_RUNS_AS_ROOT,
    MISSING_SECRET,
    MISSING_PULL_SECRET,
    CONTAINER_RUNS_AS_ROOT,
    MISSING_SERVICE_ACCOUNT,
    UNUSED,
    UNUSED_KEY,
    ZERO_SCALE,
    UNHEALTHY_REPLICAS,
    CPU_UNDER_ALLOCATED,
    CPU_OVER_ALLOCATED,
    MEM_UNDER_ALLOCATED,
    MEM_OVER_ALLOCATED,
    HPA_MISSING_DEPLOYMENT,
    HPA_MISSING_STATEFULSET,
    HPA_CPU_BURST,
    HPA_MEM_BURST,
    NAMESPACE_INACTIVE,
    MISSING_BINDING_TARGET,
];
