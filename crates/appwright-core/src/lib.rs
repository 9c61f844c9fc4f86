//! Core pipeline for appwright: living Spec -> Plan -> generated code.
//!
//! The pipeline has three persisted stages, each keyed by a project id:
//!
//! 1. [`spec`] -- the living Spec, mutated only through intent merges and
//!    snapshotted by `freeze`.
//! 2. [`plan`] -- a technical blueprint synthesized from a frozen Spec by
//!    the generation provider.
//! 3. [`codegen`] -- per-file source generation from a Plan, tolerant of
//!    individual file failures.
//!
//! [`provider`] wraps the external generation capability behind a trait with
//! retry/backoff, [`deploy`] holds the push and provisioning collaborators,
//! and [`layout`] owns the on-disk artifact layout shared by all stages.

pub mod codegen;
pub mod deploy;
pub mod layout;
pub mod pipeline;
pub mod plan;
pub mod provider;
pub mod spec;

pub use codegen::{CodeGenerator, CodegenError, Manifest};
pub use layout::DataLayout;
pub use pipeline::{BuildStage, build_stage};
pub use plan::{FileTree, Plan, PlanError, PlanSynthesizer, resolve_file_tree};
pub use provider::{
    CompletionRequest, GenerationClient, GenerationProvider, ProviderError, RetryPolicy,
};
pub use spec::{FrozenSpec, Intent, Spec, SpecStatus};
pub use spec::store::{SpecStore, SpecStoreError};
