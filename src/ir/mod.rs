pub mod block;
pub mod cc;
pub mod graph;
pub mod inst;
pub mod loop_info;
pub mod marker;
pub mod types;

pub use block::{BasicBlock, BlockFlags, BlockId, LoopId};
pub use cc::ConditionCode;
pub use graph::{Arch, ChaDependency, Graph};
pub use inst::{BinOp, CallKind, ConstValue, DeoptReason, EquivClass, Inst, InstId, InstKind, MethodRef, UnaryOp, Use};
pub use loop_info::{Loop, LoopFlags};
pub use marker::MarkerHolder;
pub use types::Type;
