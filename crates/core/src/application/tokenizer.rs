// Shell-style argument tokenizer
//
// Single pass over the trimmed command. Quotes group text and are stripped.
// Only ASCII space separates tokens; there is no escape character and an
// unterminated quote is accepted as-is.

/// Split a substituted command string into an argument vector
pub fn tokenize(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;

    for ch in command.trim().chars() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            ' ' if !in_single && !in_double => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }
    args
}
