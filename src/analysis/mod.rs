/*!
Alias analysis over functions.

`basic` implements the stateless local analysis; `chain` composes several
analyses behind one query interface. The remaining modules are the shared
machinery: pointer decomposition, underlying-object and escape reasoning,
capture tracking, and the CFG helpers they lean on.
*/

pub mod alias;
pub mod basic;
pub mod capture;
pub mod cfg;
pub mod chain;
pub mod decompose;
pub mod dominator;
pub mod objects;

pub use alias::{
    merge_alias_results, AccessTag, AliasResult, MemoryBehavior, MemoryLocation, ModRefInfo, Size,
};
pub use basic::BasicAliasAnalysis;
pub use capture::{pointer_may_be_captured, CaptureTracker};
pub use chain::{combine_alias_results, AliasChain, AliasProvider};
pub use decompose::{DecomposeStats, DecomposedPointer, MAX_LOOKUP_DEPTH};
pub use dominator::DominatorTree;
pub use objects::{
    is_escape_source, is_identified_function_local, is_identified_object, is_no_alias_argument,
    is_no_alias_call, is_non_escaping_local_object, underlying_object,
};
