//! Command line compiler
//!
//! Turns parameter descriptors into backend command-line tokens. Everything
//! here is pure: the same descriptors always compile to the same string.
//!
//! Compiled command lines run through a POSIX shell, so every value is
//! emitted as a single shell word. Parameter names come from the service
//! definition and are written as they are.

use std::borrow::Cow;

use crate::domain::param::{CmdFormat, ParamDescriptor, ParamValue};

/// Renders one parameter as a command-line token
///
/// Returns an empty string when the parameter does not contribute to the
/// command line: `NONE` format, flag formats with a falsy value, or any
/// value-bearing format without a resolved value.
pub fn element(param: &ParamDescriptor) -> String {
    let Some(value) = param.resolved_value() else {
        return String::new();
    };
    let name = &param.name;

    match param.cmd_format {
        CmdFormat::None => String::new(),
        CmdFormat::Valuated => format!("--{}={}", name, word(value)),
        CmdFormat::Simple if value.is_truthy() => format!("-{} {}", name, word(value)),
        CmdFormat::Option if value.is_truthy() => format!("-{}", name),
        CmdFormat::NamedOption if value.is_truthy() => format!("--{}", name),
        CmdFormat::Simple | CmdFormat::Option | CmdFormat::NamedOption => String::new(),
        CmdFormat::Posix => word(value),
        CmdFormat::NamedParam => format!("{}={}", name, word(value)),
    }
}

/// Quotes a value as one shell word, leaving plain values untouched
fn word(value: &ParamValue) -> String {
    let raw = value.to_string();
    if raw.is_empty() {
        return raw;
    }
    // NUL cannot be passed in an argument anyway
    let raw = raw.replace('\0', "");
    shlex::try_quote(&raw)
        .map(Cow::into_owned)
        .unwrap_or_default()
}

/// Compiles the full argument string for a job's inputs, in declaration order
pub fn compile<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = &'a ParamDescriptor>,
{
    params
        .into_iter()
        .map(element)
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Prefixes compiled arguments with the adaptor command
pub fn full_command_line(command: &str, arguments: &str) -> String {
    match (command.trim(), arguments.trim()) {
        (cmd, "") => cmd.to_string(),
        ("", args) => args.to_string(),
        (cmd, args) => format!("{} {}", cmd, args),
    }
}
