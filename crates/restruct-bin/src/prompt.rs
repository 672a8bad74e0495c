use inquire::Text;
use std::path::Path;
use tracing::warn;

/// The only answer that lets a guarded operation proceed.
pub const AFFIRMATIVE: &str = "continue";

pub fn is_affirmative(answer: &str) -> bool {
    answer == AFFIRMATIVE
}

/// Asks the operator to confirm `operation` on a shallow `path`. Anything
/// other than the exact word `continue`, including a cancelled prompt, is a
/// refusal.
pub fn confirm_shallow_path(path: &Path, operation: &str) -> bool {
    println!("\n⚠️  '{}' is about to modify a path close to the filesystem root:", operation);
    println!("  \x1b[33m{}\x1b[0m", path.display());

    let answer = Text::new(&format!("Type '{}' to proceed, anything else aborts:", AFFIRMATIVE)).prompt();

    match answer {
        Ok(answer) => is_affirmative(&answer),
        Err(err) => {
            warn!("Confirmation prompt failed: {}", err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_exact_word_is_affirmative() {
        assert!(is_affirmative("continue"));
        assert!(!is_affirmative("Continue"));
        assert!(!is_affirmative(" continue"));
        assert!(!is_affirmative("continue\n"));
        assert!(!is_affirmative("yes"));
        assert!(!is_affirmative(""));
    }
}
