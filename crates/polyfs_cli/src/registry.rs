use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::future::Future;
use std::pin::Pin;

use anyhow::bail;

use crate::commands;
use crate::state::CliState;

type Handler = for<'a> fn(
    &'a mut CliState,
    &'a [String],
) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + 'a>>;

pub struct Command {
    pub synopsis: &'static str,
    pub help: &'static str,
    handler: Handler,
}

/// All shell commands, built once at startup and handed to the REPL.
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, Command>,
}

macro_rules! handler {
    ($f:path) => {{
        fn wrap<'a>(
            state: &'a mut CliState,
            args: &'a [String],
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + 'a>> {
            Box::pin($f(state, args))
        }
        wrap as Handler
    }};
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        let mut commands = BTreeMap::new();
        let mut add = |name, synopsis, help, handler| {
            commands.insert(
                name,
                Command {
                    synopsis,
                    help,
                    handler,
                },
            );
        };

        add("cat", "cat <file>...", "print file contents", handler!(commands::cat));
        add("cd", "cd [<dir>]", "change the current directory", handler!(commands::cd));
        add("chgrp", "chgrp <gid> <file>", "change file group", handler!(commands::chgrp));
        add("chmod", "chmod <octal-mode> <file>", "change file mode", handler!(commands::chmod));
        add("chown", "chown <uid> <file>", "change file owner", handler!(commands::chown));
        add("cp", "cp <from> <to>", "copy a file", handler!(commands::cp));
        add("df", "df", "show filesystem usage", handler!(commands::df));
        add("fsid", "fsid", "show the filesystem identifier", handler!(commands::fsid));
        add("help", "help", "list commands", handler!(commands::help));
        add("lh", "lh [<dir>]", "list directory with attributes", handler!(commands::lh));
        add("ln", "ln [-s] <target> <name>", "create a hard or symbolic link", handler!(commands::ln));
        add("ls", "ls [<dir>]", "list directory", handler!(commands::ls));
        add("mkdir", "mkdir <dir>", "create a directory", handler!(commands::mkdir));
        add("mkfifo", "mkfifo <name>", "create a named pipe", handler!(commands::mkfifo));
        add("mv", "mv <from> <to>", "rename a file or directory", handler!(commands::mv));
        add("pwd", "pwd", "print the current directory", handler!(commands::pwd));
        add("quit", "quit", "leave the shell", handler!(commands::quit));
        add("rm", "rm <file>...", "remove files", handler!(commands::rm));
        add("rmdir", "rmdir <dir>...", "remove empty directories", handler!(commands::rmdir));
        add("stat", "stat <file>", "show file attributes", handler!(commands::stat));

        Self { commands }
    }

    pub async fn run(
        &self,
        state: &mut CliState,
        name: &str,
        args: &[String],
    ) -> anyhow::Result<()> {
        let Some(command) = self.commands.get(name) else {
            bail!("{name}: unknown command (try 'help')");
        };
        (command.handler)(state, args).await
    }

    /// The text the `help` command prints.
    #[must_use]
    pub fn help_text(&self) -> String {
        let mut out = String::new();
        for command in self.commands.values() {
            let _ = writeln!(out, "{:<28} {}", command.synopsis, command.help);
        }
        out
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
