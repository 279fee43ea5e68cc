//! # Storyloom: Content-Generation Workflow Engine
//!
//! Storyloom is the execution engine of a visual, graph-based
//! content-generation editor: users wire typed nodes (script planners,
//! image/video generators, analyzers) into a directed canvas, and each
//! node, when triggered, consumes upstream output, calls an external
//! generation collaborator, and may materialize new downstream nodes.
//!
//! ## Core Concepts
//!
//! - **Canvas**: an immutable graph snapshot (nodes, connections, cosmetic
//!   groups) replaced copy-on-write on every engine step
//! - **Kinds**: a closed set of node roles, each with one registered step
//!   handler; multi-stage generators carry an explicit pipeline stage
//! - **Resolver**: cycle-safe backward traversal aggregating upstream
//!   context and the nearest planner's style triple
//! - **Grouping**: order-preserving, duration-bounded batching of timed
//!   work items
//! - **Growth**: append-only spawning of child nodes/edges/groups from
//!   generation results, checkpointed for single-unit undo
//!
//! ## Quick Start
//!
//! Pure parts of the engine work without any collaborators:
//!
//! ```
//! use storyloom::artifacts::Shot;
//! use storyloom::canvas::{Canvas, Node, NodePayload};
//! use storyloom::grouping::group_by_duration;
//! use storyloom::resolver::resolve_style_context;
//! use storyloom::types::{NodeId, Position};
//!
//! // Batch timed shots without exceeding 10 seconds per group.
//! let shots = vec![
//!     Shot::new(1, "establishing", 4.0),
//!     Shot::new(2, "two-shot", 4.0),
//!     Shot::new(3, "insert", 4.0),
//! ];
//! let groups = group_by_duration(shots, 10.0);
//! assert_eq!(groups.len(), 2);
//!
//! // Style context falls back to fixed defaults without a planner ancestor.
//! let canvas = Canvas::builder()
//!     .with_node(Node::new("v", Position::default(), NodePayload::storyboard_batch()))
//!     .build();
//! let style = resolve_style_context(&canvas, &NodeId::from("v"));
//! assert_eq!(style.visual_style, "cinematic");
//! ```
//!
//! Driving nodes requires an [`engine::Engine`] constructed with a
//! [`services::Services`] bundle: async trait objects for the generation
//! providers, prompt builder, image fusion, optional asset store/cache, and
//! the undo-history checkpoint. See the integration tests for complete
//! stub-backed setups.
//!
//! ## Module Guide
//!
//! - [`types`] - Ids, kinds, statuses, stages, style context, geometry
//! - [`canvas`] - Graph model and read-only queries
//! - [`artifacts`] - Beats, shots, and generated media artifacts
//! - [`resolver`] - Upstream context and style resolution
//! - [`grouping`] - Duration-bounded task batching
//! - [`handlers`] - Per-kind step handlers and the dispatch registry
//! - [`engine`] - The `execute` entry point and snapshot publication
//! - [`growth`] - Child spawning and group layout
//! - [`services`] - External collaborator contracts
//! - [`events`] - Engine event stream
//! - [`cancel`] - Per-node cancellation tokens
//! - [`config`] - Engine and layout tunables
//! - [`errors`] - The engine error taxonomy
//! - [`telemetry`] - Tracing subscriber setup

pub mod artifacts;
pub mod cancel;
pub mod canvas;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod growth;
pub mod grouping;
pub mod handlers;
pub mod resolver;
pub mod services;
pub mod telemetry;
pub mod types;
