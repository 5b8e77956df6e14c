// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Service configuration.

Start from [`Config::default`] (or [`Config::from_env`]) and adjust with the `with_*`
setters.  Environment overrides:

| variable                            | effect                                  |
|-------------------------------------|-----------------------------------------|
| `FRAME_RELAY_HANDLE_CAPACITY`       | capacity of every handle table          |
| `FRAME_RELAY_VERTEX_ARENA`          | initial vertex arena bytes              |
| `FRAME_RELAY_INDEX_ARENA`           | initial index arena bytes               |
| `FRAME_RELAY_UNIFORM_ARENA`         | initial uniform arena bytes             |
| `FRAME_RELAY_UNIFORM_ALIGNMENT`     | uniform block alignment (power of two)  |
| `FRAME_RELAY_TRACE_COMMANDS`        | `1` logs every command the worker runs  |
*/

use crate::arena::Usage;

pub const DEFAULT_HANDLE_CAPACITY: u32 = 4096;
pub const DEFAULT_UNIFORM_ALIGNMENT: u32 = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub buffer_capacity: u32,
    pub texture_capacity: u32,
    pub pipeline_capacity: u32,
    pub pass_capacity: u32,
    pub material_capacity: u32,
    /// Initial committed length of each arena, indexed by [`Usage::index`].
    pub arena_sizes: [u32; 3],
    pub uniform_alignment: u32,
    pub worker_name: String,
    pub trace_commands: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            buffer_capacity: DEFAULT_HANDLE_CAPACITY,
            texture_capacity: DEFAULT_HANDLE_CAPACITY,
            pipeline_capacity: DEFAULT_HANDLE_CAPACITY,
            pass_capacity: DEFAULT_HANDLE_CAPACITY,
            material_capacity: DEFAULT_HANDLE_CAPACITY,
            arena_sizes: [1 << 20, 256 << 10, 256 << 10],
            uniform_alignment: DEFAULT_UNIFORM_ALIGNMENT,
            worker_name: String::from("frame_relay worker"),
            trace_commands: false,
        }
    }
}

fn env_u32(name: &str) -> Option<u32> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            logwise::warn_sync!(
                "ignoring {name}={value}: not an unsigned integer",
                name = name.to_string(),
                value = value
            );
            None
        }
    }
}

impl Config {
    /// [`Config::default`] with any `FRAME_RELAY_*` overrides applied.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Some(capacity) = env_u32("FRAME_RELAY_HANDLE_CAPACITY") {
            config = config.with_handle_capacity(capacity);
        }
        let arenas = [
            ("FRAME_RELAY_VERTEX_ARENA", Usage::Vertex),
            ("FRAME_RELAY_INDEX_ARENA", Usage::Index),
            ("FRAME_RELAY_UNIFORM_ARENA", Usage::Uniform),
        ];
        for (name, usage) in arenas {
            if let Some(size) = env_u32(name) {
                config = config.with_arena_size(usage, size);
            }
        }
        if let Some(alignment) = env_u32("FRAME_RELAY_UNIFORM_ALIGNMENT") {
            if alignment.is_power_of_two() {
                config = config.with_uniform_alignment(alignment);
            } else {
                logwise::warn_sync!(
                    "ignoring FRAME_RELAY_UNIFORM_ALIGNMENT={alignment}: not a power of two",
                    alignment = alignment
                );
            }
        }
        config.trace_commands = std::env::var("FRAME_RELAY_TRACE_COMMANDS")
            .map(|e| e == "1")
            .unwrap_or(false);
        config
    }

    /// Sets the capacity of every handle table.
    pub fn with_handle_capacity(mut self, capacity: u32) -> Self {
        self.buffer_capacity = capacity;
        self.texture_capacity = capacity;
        self.pipeline_capacity = capacity;
        self.pass_capacity = capacity;
        self.material_capacity = capacity;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: u32) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_texture_capacity(mut self, capacity: u32) -> Self {
        self.texture_capacity = capacity;
        self
    }

    pub fn with_arena_size(mut self, usage: Usage, size: u32) -> Self {
        self.arena_sizes[usage.index()] = size;
        self
    }

    /// # Panics
    /// Panics if `alignment` is not a power of two.
    pub fn with_uniform_alignment(mut self, alignment: u32) -> Self {
        assert!(
            alignment.is_power_of_two(),
            "uniform alignment must be a power of two"
        );
        self.uniform_alignment = alignment;
        self
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn with_trace_commands(mut self, trace: bool) -> Self {
        self.trace_commands = trace;
        self
    }

    /// Handles one service needs for its own arena buffers.
    pub(crate) const fn arena_buffer_count() -> u32 {
        //two slots, one gpu and one staging buffer per usage
        2 * 3 * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.buffer_capacity, 4096);
        assert_eq!(c.arena_sizes[Usage::Vertex.index()], 1 << 20);
        assert_eq!(c.arena_sizes[Usage::Uniform.index()], 256 * 1024);
        assert_eq!(c.uniform_alignment, 256);
        assert!(!c.trace_commands);
    }

    #[test]
    fn builders() {
        let c = Config::default()
            .with_handle_capacity(16)
            .with_texture_capacity(4)
            .with_arena_size(Usage::Index, 512)
            .with_uniform_alignment(64)
            .with_worker_name("gpu")
            .with_trace_commands(true);
        assert_eq!(c.buffer_capacity, 16);
        assert_eq!(c.pass_capacity, 16);
        assert_eq!(c.texture_capacity, 4);
        assert_eq!(c.arena_sizes[1], 512);
        assert_eq!(c.uniform_alignment, 64);
        assert_eq!(c.worker_name, "gpu");
        assert!(c.trace_commands);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn alignment_must_be_power_of_two() {
        let _ = Config::default().with_uniform_alignment(100);
    }
}
