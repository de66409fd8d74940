//! # BULLETRAIN - Bullet Hell Engine
//!
//! Engine context for a 2D bullet hell: thousands of bullets moving every
//! tick, read by render threads while a script bridge mutates them.
//!
//! ## Architecture
//!
//! - **Pools**: bullets, player bullets and enemy data live in fixed
//!   [`EntityPool`](bulletrain_core::EntityPool)s sized at startup
//! - **Types**: bullet templates registered by index, sprites cut from
//!   images in archives
//! - **Scripts**: a bounds-checked bridge addressing bullets by index
//! - **Clock**: a 60Hz thread posting pulses to the simulation thread
//!
//! ## Threads
//!
//! ```text
//!   clock ──pulse──► simulation ──write──► pools ◄──read── render
//!                        │
//!                        └── script bridge
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use bulletrain::{Engine, EngineConfig};
//!
//! let engine = Engine::shared(EngineConfig::default())?;
//! let clock = engine.start_clock()?;
//! while clock.wait_pulse().is_some() {
//!     engine.step();
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bullet;
pub mod config;
pub mod enemy;
pub mod engine;
pub mod error;
pub mod player;
pub mod script;
pub mod timer;
pub mod types;

pub use bullet::{Bullet, BulletFlags, BulletType, PlayField};
pub use config::EngineConfig;
pub use enemy::{EnemyData, GAME_DATA_WORDS};
pub use engine::{Engine, StepReport};
pub use error::{EngineError, EngineResult, ScriptError, ScriptResult};
pub use player::{Launch, PlayerBullet, PlayerBulletFlags, PlayerBulletType};
pub use script::{ScriptContext, TypeSpec};
pub use timer::{tick_interval, Clock, ClockHandle};
pub use types::{Sprite, SpriteRegion, TypeRegistry};
