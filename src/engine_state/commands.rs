//! # Console Commands
//!
//! The world answers to a fixed set of text commands, looked up in a static table.
//! A command line is parsed into a `ConsoleCommand` first and only then applied, so a
//! malformed line never touches a world.
//!
//! | Command | Arguments | Effect |
//! |---|---|---|
//! | `chunk_visible_distance` | radius (unsigned) | changes the frontier radius |
//! | `world_reset` | none | deletes the files in the world's storage directory |
//! | `sunlight` | level (0-15) | sets the light level and rebuilds every chunk's geometry |

use log::info;

use crate::{config::MAX_SUNLIGHT_LEVEL, error::CommandError};

use super::voxels::world::World;

/// A validated command, ready to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    ChunkVisibleDistance(u32),
    WorldReset,
    Sunlight(u8),
}

/// An entry of the command table.
pub struct CommandSpec {
    pub name: &'static str,
    /// Exact number of arguments.
    pub arguments: usize,
    pub usage: &'static str,
    pub description: &'static str,
    parse: fn(&'static str, &[&str]) -> Result<ConsoleCommand, CommandError>,
}

/// Every command a world understands.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "chunk_visible_distance",
        arguments: 1,
        usage: "chunk_visible_distance <radius>",
        description: "Sets how many chunks around each observer are kept loaded",
        parse: parse_visible_distance,
    },
    CommandSpec {
        name: "world_reset",
        arguments: 0,
        usage: "world_reset",
        description: "Deletes the saved chunk files of the world",
        parse: parse_world_reset,
    },
    CommandSpec {
        name: "sunlight",
        arguments: 1,
        usage: "sunlight <0-15>",
        description: "Sets the sunlight level and recalculates every chunk",
        parse: parse_sunlight,
    },
];

fn parse_visible_distance(name: &'static str, arguments: &[&str]) -> Result<ConsoleCommand, CommandError> {
    let value = arguments[0];
    value
        .parse::<u32>()
        .map(ConsoleCommand::ChunkVisibleDistance)
        .map_err(|error| CommandError::InvalidArgument {
            name,
            value: value.to_string(),
            reason: error.to_string(),
        })
}

fn parse_world_reset(_name: &'static str, _arguments: &[&str]) -> Result<ConsoleCommand, CommandError> {
    Ok(ConsoleCommand::WorldReset)
}

fn parse_sunlight(name: &'static str, arguments: &[&str]) -> Result<ConsoleCommand, CommandError> {
    let value = arguments[0];
    let invalid = |reason: String| CommandError::InvalidArgument {
        name,
        value: value.to_string(),
        reason,
    };

    let level = value.parse::<i64>().map_err(|error| invalid(error.to_string()))?;
    match u8::try_from(level) {
        Ok(level) if level <= MAX_SUNLIGHT_LEVEL => Ok(ConsoleCommand::Sunlight(level)),
        _ => Err(invalid(format!("must be between 0 and {MAX_SUNLIGHT_LEVEL}"))),
    }
}

/// Looks up a command by name.
pub fn find_command(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|command| command.name == name)
}

impl ConsoleCommand {
    /// Parses a whitespace-separated command line.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default();
        let arguments: Vec<&str> = words.collect();

        let command = find_command(name).ok_or_else(|| CommandError::UnknownCommand {
            name: name.to_string(),
        })?;
        if arguments.len() != command.arguments {
            return Err(CommandError::WrongArgumentCount {
                name: command.name,
                expected: command.arguments,
                got: arguments.len(),
            });
        }
        (command.parse)(command.name, &arguments)
    }

    /// Applies the command to `world`.
    pub fn apply(self, world: &mut World) -> Result<(), CommandError> {
        info!("World {}: {:?}", world.owner(), self);
        match self {
            ConsoleCommand::ChunkVisibleDistance(distance) => world.set_visible_distance(distance),
            ConsoleCommand::WorldReset => {
                world.reset_storage()?;
            }
            ConsoleCommand::Sunlight(level) => world.set_sunlight_level(level),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::WorldConfig;

    fn world_in(dir: &std::path::Path) -> World {
        World::new(WorldConfig {
            storage_dir: dir.to_path_buf(),
            ..WorldConfig::default()
        })
    }

    #[test]
    fn command_table_names_are_unique() {
        for (index, command) in COMMANDS.iter().enumerate() {
            assert!(COMMANDS[index + 1..].iter().all(|other| other.name != command.name));
            assert!(command.usage.starts_with(command.name));
        }
    }

    #[test]
    fn parses_well_formed_lines() {
        assert_eq!(
            ConsoleCommand::parse("chunk_visible_distance 6").unwrap(),
            ConsoleCommand::ChunkVisibleDistance(6)
        );
        assert_eq!(ConsoleCommand::parse("  world_reset ").unwrap(), ConsoleCommand::WorldReset);
        assert_eq!(ConsoleCommand::parse("sunlight 15").unwrap(), ConsoleCommand::Sunlight(15));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            ConsoleCommand::parse("fly 1"),
            Err(CommandError::UnknownCommand { name }) if name == "fly"
        ));
        assert!(matches!(
            ConsoleCommand::parse(""),
            Err(CommandError::UnknownCommand { .. })
        ));
        assert!(matches!(
            ConsoleCommand::parse("sunlight"),
            Err(CommandError::WrongArgumentCount { expected: 1, got: 0, .. })
        ));
        assert!(matches!(
            ConsoleCommand::parse("world_reset now"),
            Err(CommandError::WrongArgumentCount { expected: 0, got: 1, .. })
        ));
        for line in ["sunlight 16", "sunlight -1", "sunlight bright", "chunk_visible_distance -2"] {
            assert!(
                matches!(ConsoleCommand::parse(line), Err(CommandError::InvalidArgument { .. })),
                "{line}"
            );
        }
    }

    #[test]
    fn sunlight_sets_level_and_forces_recalculation() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = world_in(dir.path());
        ConsoleCommand::parse("sunlight 7").unwrap().apply(&mut world).unwrap();

        assert_eq!(world.sunlight_level(), 7);
        assert!(world.is_reload_all_requested());
    }

    #[test]
    fn visible_distance_command_updates_the_world() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = world_in(dir.path());
        ConsoleCommand::parse("chunk_visible_distance 9")
            .unwrap()
            .apply(&mut world)
            .unwrap();
        assert_eq!(world.visible_distance(), 9);
    }

    #[test]
    fn world_reset_removes_files_and_keeps_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("0_0_0.chunk"), b"blocks").unwrap();
        fs::write(dir.path().join("16_0_0.chunk"), b"blocks").unwrap();
        fs::create_dir(dir.path().join("players")).unwrap();
        fs::write(dir.path().join("players").join("alice"), b"pos").unwrap();

        let mut world = world_in(dir.path());
        ConsoleCommand::parse("world_reset").unwrap().apply(&mut world).unwrap();

        assert!(dir.path().is_dir());
        assert!(!dir.path().join("0_0_0.chunk").exists());
        assert!(!dir.path().join("16_0_0.chunk").exists());
        assert!(dir.path().join("players").join("alice").exists());
    }

    #[test]
    fn world_reset_without_directory_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let world = world_in(&dir.path().join("missing"));
        assert_eq!(world.reset_storage().unwrap(), 0);
    }
}
