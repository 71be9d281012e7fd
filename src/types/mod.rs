pub mod infer;
pub mod ty;

pub use infer::{CallSite, CallTarget, InferenceReport, SlotKind, Uninferred, infer_program};
pub use ty::{Type, TypeInfo, TypeSlot};
