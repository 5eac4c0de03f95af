use std::{env, fmt::Display};

use dialoguer::console::{StyledObject, style};

use crate::constants::NO_COLOR_ENV;

/// Terminal output settings, built once in `main` and passed to anything
/// that talks to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    verbose: bool,
    color: bool,
}

impl Output {
    pub fn new(verbose: bool, color: bool) -> Self {
        Self { verbose, color }
    }

    /// Any `-v` enables detail lines; `NO_COLOR` disables styling.
    pub fn from_env(verbose: u8) -> Self {
        Self::new(verbose > 0, env::var_os(NO_COLOR_ENV).is_none())
    }

    /// Printed only in verbose mode.
    pub fn detail(&self, message: impl Display) {
        if self.verbose {
            println!("{}", self.paint(style(message).dim()));
        }
    }

    pub fn success(&self, message: impl Display) {
        println!("{}", self.paint(style(message).green()));
    }

    pub fn warn(&self, message: impl Display) {
        eprintln!("{}", self.paint(style(message).yellow()));
    }

    pub fn error(&self, message: impl Display) {
        eprintln!("{}", self.paint(style(message).red().bold()));
    }

    fn paint<D: Display>(&self, styled: StyledObject<D>) -> StyledObject<D> {
        if self.color {
            styled
        } else {
            styled.force_styling(false)
        }
    }
}
