//! Agent process I/O.
//!
//! Each turn spawns one agent process, writes one JSON request line to its
//! stdin, and reads one JSON event per line from its stdout.
//!
//! - `spawner`: executable resolution, invocation arguments, process handle.
//! - `codec`: [`LinesCodec`](tokio_util::codec::LinesCodec)-based framing.
//! - `reader`: strict decoding of lines into [`ThreadEvent`](crate::ThreadEvent)s.
//! - `writer`: the turn request payload on stdin.

pub mod codec;
pub mod reader;
pub mod spawner;
pub mod writer;
