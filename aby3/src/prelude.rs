pub use crate::config::{init_protocol_name, Aby3Config, ABY3_PROTOCOL_NAME};
pub use crate::context::Aby3Context;
pub use crate::error::{Error, Result};
pub use crate::instance::{init_instance, mpc_instance};
pub use crate::kernels::{execute, DispatchKernel, OpKind, Operator, ShapeRule};
pub use crate::networking::{LocalSyncNetworking, SyncNetworking, TcpNetworking};
pub use crate::party::PartyId;
pub use crate::prng::{PrngKind, RawSeed};
pub use crate::replicated::*;
pub use crate::ring::Ring64Tensor;
