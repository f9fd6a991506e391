// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell completion generation for the ipcq CLI.
//!
//! ```bash
//! ipcq completions bash > ~/.local/share/bash-completion/completions/ipcq
//! ipcq completions zsh > ~/.zfunc/_ipcq
//! ```

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

/// Generate shell completions and write to stdout.
pub fn generate_completions<C: CommandFactory>(shell: Shell) {
    let mut cmd = C::command();
    generate(shell, &mut cmd, "ipcq", &mut io::stdout());
}
