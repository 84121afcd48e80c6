//! POSIX shell quoting and command-line composition.

/// Quote `s` as one POSIX shell word.
///
/// Words made only of characters the shell never interprets are returned as-is; anything else
/// is wrapped in single quotes with embedded single quotes spliced as `'"'"'`.
pub fn quote(s: &str) -> String {
    if !s.is_empty() && s.chars().all(is_plain) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

/// Render `line` so it can follow a wrapper program as its argument vector.
///
/// A simple command (words of plain characters only, starting with a program name) is passed
/// through. Anything that needs a shell to mean what it says, such as pipelines, `&&`,
/// redirections, quoting, builtins or leading `VAR=value` assignments, is wrapped into
/// `sh -c '<line>'` so the wrapper applies to the whole line rather than its first word.
pub fn as_argv(line: &str) -> String {
    let line = line.trim();
    if is_simple(line) {
        line.to_string()
    } else {
        format!("sh -c {}", quote(line))
    }
}

/// Shell builtins and reserved words; none of them can be exec'd by a wrapper.
const SHELL_ONLY: &[&str] = &[
    ".", ":", "alias", "bg", "break", "case", "cd", "command", "continue", "do", "done", "elif",
    "else", "esac", "eval", "exec", "exit", "export", "fc", "fg", "fi", "for", "getopts", "hash",
    "if", "jobs", "local", "read", "readonly", "return", "set", "shift", "source", "then",
    "times", "trap", "type", "ulimit", "umask", "unalias", "unset", "until", "wait", "while",
];

fn is_simple(line: &str) -> bool {
    let Some(program) = line.split(' ').next() else {
        return false;
    };
    line.chars().all(|c| is_plain(c) || c == ' ')
        && !program.contains('=')
        && !SHELL_ONLY.contains(&program)
}

/// Prefix `line` with a wrapper invocation, e.g. `taskset -c 0-3`.
pub fn wrap(prefix: &str, line: &str) -> String {
    format!("{prefix} {}", as_argv(line))
}

fn is_plain(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ',' | ':' | '=' | '+' | '@' | '%')
}
