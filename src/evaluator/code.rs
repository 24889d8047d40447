// src/evaluator/code.rs — Program text post-processing for model-generated code

const PYTHON_FENCE: &str = "```python";
const FENCE: &str = "```";

/// Neutralize print/debug statements so they cannot interfere with result
/// capture. Each one becomes `pass` at the same indentation, which keeps
/// blocks that only printed syntactically valid.
pub fn remove_prints(code: &str) -> String {
    code.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if is_print_statement(trimmed) {
                let indent = &line[..line.len() - trimmed.len()];
                format!("{indent}pass")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_print_statement(trimmed: &str) -> bool {
    trimmed == "print"
        || trimmed.starts_with("print(")
        || trimmed.starts_with("print ")
        || trimmed.starts_with("pprint(")
}

/// The body of the first fenced block, or the text itself when unfenced.
///
/// Handles both ```` ```python ```` and bare ```` ``` ```` fences.
pub fn strip_code_fence(raw: &str) -> &str {
    if let Some((_, rest)) = raw.split_once(PYTHON_FENCE) {
        return rest.split(FENCE).next().unwrap_or(rest);
    }
    let trimmed = raw.trim_start();
    if let Some(rest) = trimmed.strip_prefix(FENCE) {
        // Skip an info string on the opening fence line.
        let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
        return body.split(FENCE).next().unwrap_or(body);
    }
    raw
}

/// Recover an executable program from a plan-to-code completion.
///
/// The completion either contains a fenced block, or continues the assistant
/// turn that already opened `def solution():` and its docstring. In the
/// second case the header is dropped if the model repeated it, and
/// `preamble` (header plus docstring) is prepended.
pub fn extract_program(raw: &str, preamble: &str) -> String {
    let code = if raw.contains(PYTHON_FENCE) {
        strip_code_fence(raw).to_string()
    } else {
        let continuation = raw.split(FENCE).next().unwrap_or("");
        let continuation = if continuation.starts_with("def solution():") {
            continuation
                .split_once('\n')
                .map(|(_, rest)| rest)
                .unwrap_or("")
        } else {
            continuation
        };
        format!("{preamble}\n{continuation}")
    };
    remove_prints(&code)
}

/// Drop the docstring block (first to last line that is exactly `"""` or
/// `'''`) from a program so only its code is shown to the selector.
pub fn strip_docstring(program: &str) -> String {
    let lines: Vec<&str> = program.lines().collect();
    let marks: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| matches!(l.trim(), "\"\"\"" | "'''"))
        .map(|(i, _)| i)
        .collect();

    match (marks.first(), marks.last()) {
        (Some(&start), Some(&end)) if start < end => lines[..start]
            .iter()
            .chain(lines[end + 1..].iter())
            .copied()
            .collect::<Vec<_>>()
            .join("\n"),
        _ => program.to_string(),
    }
}

/// Split a plan-to-code solution into its plan and its code at the first
/// `def ...:` line. `None` when no function definition is present.
pub fn split_plan_code(solution: &str) -> Option<(String, String)> {
    let solution = solution.trim();
    let lines: Vec<&str> = solution.lines().collect();
    let def_idx = lines
        .iter()
        .position(|l| l.starts_with("def ") && l.trim_end().ends_with(':'))?;
    Some((lines[..def_idx].join("\n"), lines[def_idx..].join("\n")))
}

/// The usable part of a plan completion: everything before `</end>`,
/// trimmed. An empty plan is `None`.
pub fn postprocess_plan(raw: &str) -> Option<String> {
    let plan = raw.split("</end>").next().unwrap_or("").trim();
    (!plan.is_empty()).then(|| plan.to_string())
}

/// Indent a plan so it can sit inside the `solution()` docstring: every line
/// gets four spaces, `</end>` lines are dropped, and the block is wrapped in
/// newlines with a trailing indent before the closing quotes.
pub fn indent_plan(plan: &str) -> String {
    const INDENT: &str = "    ";
    let body = plan
        .split('\n')
        .filter(|l| *l != "</end>")
        .map(|l| format!("{INDENT}{l}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n{body}\n{INDENT}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_remove_prints_keeps_blocks_valid() {
        let code = "def solution():\n    x = 3\n    if x:\n        print(x)\n    return x";
        assert_eq!(
            remove_prints(code),
            "def solution():\n    x = 3\n    if x:\n        pass\n    return x"
        );
    }

    #[test]
    fn test_remove_prints_ignores_identifiers() {
        let code = "printed_pages = 4\nprint('debug')";
        assert_eq!(remove_prints(code), "printed_pages = 4\npass");
    }

    #[test]
    fn test_strip_python_fence() {
        let raw = "Here you go:\n```python\ndef solution():\n    return 1\n```\nDone.";
        assert_eq!(strip_code_fence(raw), "\ndef solution():\n    return 1\n");
    }

    #[test]
    fn test_strip_bare_fence() {
        let raw = "```\ndef solution():\n    return 2\n```";
        assert_eq!(strip_code_fence(raw), "def solution():\n    return 2\n");
    }

    #[test]
    fn test_strip_fence_passthrough() {
        let raw = "def solution():\n    return 3";
        assert_eq!(strip_code_fence(raw), raw);
    }

    #[test]
    fn test_extract_program_from_fenced_block() {
        let raw = "```python\ndef solution():\n    print('hi')\n    return 4\n```";
        assert_eq!(
            extract_program(raw, "IGNORED"),
            "\ndef solution():\n    pass\n    return 4\n"
        );
    }

    #[test]
    fn test_extract_program_continuation_prepends_preamble() {
        let preamble = "def solution():\n    \"\"\"\n    1. add\n    \"\"\"";
        let raw = "    a = 2\n    return a + 2";
        assert_eq!(
            extract_program(raw, preamble),
            format!("{preamble}\n    a = 2\n    return a + 2")
        );
    }

    #[test]
    fn test_extract_program_deduplicates_header() {
        let preamble = "def solution():\n    \"\"\"plan\"\"\"";
        let raw = "def solution():\n    return 5";
        assert_eq!(
            extract_program(raw, preamble),
            format!("{preamble}\n    return 5")
        );
    }

    #[test]
    fn test_strip_docstring() {
        let program = "def solution():\n    \"\"\"\n    plan line\n    \"\"\"\n    return 1";
        assert_eq!(strip_docstring(program), "def solution():\n    return 1");
    }

    #[test]
    fn test_strip_docstring_without_block() {
        let program = "def solution():\n    return 1";
        assert_eq!(strip_docstring(program), program);
    }

    #[test]
    fn test_split_plan_code() {
        let sol = "1. count apples\n2. add\ndef solution():\n    return 3";
        let (plan, code) = split_plan_code(sol).unwrap();
        assert_eq!(plan, "1. count apples\n2. add");
        assert_eq!(code, "def solution():\n    return 3");
    }

    #[test]
    fn test_split_plan_code_without_def() {
        assert!(split_plan_code("just prose, the answer is 3").is_none());
    }

    #[test]
    fn test_postprocess_plan() {
        assert_eq!(
            postprocess_plan("1. Add.\n2. Return.\n</end>\nQuestion: next"),
            Some("1. Add.\n2. Return.".to_string())
        );
        assert_eq!(postprocess_plan("   \n</end>"), None);
        assert_eq!(postprocess_plan(""), None);
    }

    #[test]
    fn test_indent_plan() {
        assert_eq!(
            indent_plan("1. Add.\n2. Return.\n</end>"),
            "\n    1. Add.\n    2. Return.\n    "
        );
    }
}
