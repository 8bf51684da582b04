//! # chip8vm
//!
//! A CHIP-8 virtual machine core, with a terminal frontend in the binary.
//!
//! ## Design
//!
//! * the core is a plain value: construct a [`Chip8Interpreter`], load a
//!   program, then drive it with `tick(dt)` from whatever loop the frontend has
//! * timers run off the `dt` handed to `tick`, so they stay at 60Hz however
//!   fast instructions are executed
//! * `Fx0A` never blocks; ticks just skip execution until a key is down
//! * abstract the framebuffer so frontends can plug their own (e.g. tracking
//!   dirty regions); the interpreter is generic over [`Framebuffer`]
//! * subtraction (`8xy5`, `8xy7`) clamps at zero instead of wrapping
//!
//! Model
//!
//! ```text
//! frontend (main.rs)
//!  |-- display: renders a Framebuffer
//!  |-- input: key events -> ControlButton -> press/release
//!  `-- interpreter
//!       |-- memory (+ digit font)
//!       |-- instruction codec
//!       |-- video ram (Framebuffer)
//!       `-- delay & sound timers
//! ```
pub mod display;
pub mod error;
pub mod input;
pub mod instruction;
pub mod interpreter;
pub mod memory;
pub mod timer;
pub mod video;

pub use error::{Chip8Error, Result};
pub use instruction::{Field, Instruction, Pattern};
pub use interpreter::{Breakpoint, Chip8Interpreter, Config, VmState};
pub use timer::Timer;
pub use video::{Framebuffer, VideoRam};
