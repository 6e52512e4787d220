//! Loop-depth complexity heuristic.
//!
//! A placeholder for a real analyser: counts nested loops (indentation for
//! Python, braces for JavaScript), spots sorting calls and self-recursive
//! functions, and maps the result onto a [`ComplexityClass`].

use super::{ComplexityClass, ComplexityEstimate, Language};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Shape {
    max_loop_depth: usize,
    sorts: bool,
    /// Highest number of self-calls found in any function body
    self_calls: usize,
}

/// Estimate the complexity of `code`
pub fn estimate(code: &str, language: Language) -> ComplexityEstimate {
    let shape = Shape {
        max_loop_depth: match language {
            Language::Python => python_loop_depth(code),
            Language::JavaScript => brace_loop_depth(code),
        },
        sorts: code.contains("sorted(") || code.contains(".sort("),
        self_calls: max_self_calls(code, language),
    };

    let class = classify(shape);
    ComplexityEstimate {
        class,
        explanation: format!(
            "Heuristic: {} nested loop(s), {} self-call(s){}. Estimated: {}",
            shape.max_loop_depth,
            shape.self_calls,
            if shape.sorts { ", sorting" } else { "" },
            class.label()
        ),
    }
}

fn classify(shape: Shape) -> ComplexityClass {
    if shape.self_calls >= 2 {
        return ComplexityClass::Exponential;
    }

    let by_loops = match shape.max_loop_depth {
        0 if shape.self_calls == 1 => ComplexityClass::Linear,
        0 => ComplexityClass::Constant,
        1 => ComplexityClass::Linear,
        2 => ComplexityClass::Quadratic,
        _ => ComplexityClass::Cubic,
    };

    if shape.sorts && by_loops < ComplexityClass::Linearithmic {
        ComplexityClass::Linearithmic
    } else {
        by_loops
    }
}

fn words(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
}

fn has_loop_keyword(line: &str) -> bool {
    words(line).any(|w| w == "for" || w == "while")
}

fn python_loop_depth(code: &str) -> usize {
    // Indentation of each enclosing loop header
    let mut open_loops: Vec<usize> = Vec::new();
    let mut max_depth = 0;

    for line in code.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indent = line.len() - line.trim_start().len();
        while open_loops.last().is_some_and(|&level| level >= indent) {
            open_loops.pop();
        }

        let first = words(trimmed).next();
        if matches!(first, Some("for" | "while")) {
            open_loops.push(indent);
            max_depth = max_depth.max(open_loops.len());
        } else if has_loop_keyword(trimmed) {
            // Comprehension inside the current block
            max_depth = max_depth.max(open_loops.len() + 1);
        }
    }

    max_depth
}

fn brace_loop_depth(code: &str) -> usize {
    // One entry per open brace, true when that brace opened a loop body
    let mut braces: Vec<bool> = Vec::new();
    let mut max_depth = 0;

    for line in code.lines() {
        let mut pending_loop = has_loop_keyword(line);
        let mut opened_body = false;

        for c in line.chars() {
            match c {
                '{' => {
                    braces.push(pending_loop);
                    opened_body |= pending_loop;
                    pending_loop = false;
                }
                '}' => {
                    braces.pop();
                }
                _ => {}
            }
            let depth = braces.iter().filter(|&&is_loop| is_loop).count();
            max_depth = max_depth.max(depth);
        }

        if pending_loop && !opened_body {
            // Braceless loop body on the following statement
            let depth = braces.iter().filter(|&&is_loop| is_loop).count() + 1;
            max_depth = max_depth.max(depth);
        }
    }

    max_depth
}

fn function_names(code: &str, language: Language) -> Vec<(usize, String)> {
    let keyword = match language {
        Language::Python => "def",
        Language::JavaScript => "function",
    };

    code.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let mut ws = words(line);
            ws.find(|w| *w == keyword)?;
            ws.next().map(|name| (i, name.to_string()))
        })
        .collect()
}

fn max_self_calls(code: &str, language: Language) -> usize {
    let lines: Vec<&str> = code.lines().collect();

    function_names(code, language)
        .into_iter()
        .map(|(def_line, name)| {
            let call = format!("{name}(");
            lines
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != def_line)
                .map(|(_, line)| line.matches(call.as_str()).count())
                .sum::<usize>()
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line_code_is_constant() {
        let code = "print(input_data[::-1])";
        assert_eq!(estimate(code, Language::Python).class, ComplexityClass::Constant);
    }

    #[test]
    fn test_single_loop_is_linear() {
        let code = "total = 0\nfor ch in input_data:\n    total += int(ch)\nprint(total)";
        assert_eq!(estimate(code, Language::Python).class, ComplexityClass::Linear);
    }

    #[test]
    fn test_nested_python_loops() {
        let code = r#"
n = int(input_data)
count = 0
for i in range(n):
    for j in range(n):
        count += 1
for k in range(n):
    count -= 1
print(count)
"#;
        let estimate = estimate(code, Language::Python);
        assert_eq!(estimate.class, ComplexityClass::Quadratic);
        assert!(estimate.explanation.contains("O(n²)"));
    }

    #[test]
    fn test_sibling_loops_do_not_nest() {
        let code = "for a in x:\n    pass\nfor b in y:\n    pass\n";
        assert_eq!(estimate(code, Language::Python).class, ComplexityClass::Linear);
    }

    #[test]
    fn test_sorting_is_linearithmic() {
        let code = "print(' '.join(sorted(input_data)))";
        assert_eq!(
            estimate(code, Language::Python).class,
            ComplexityClass::Linearithmic
        );
    }

    #[test]
    fn test_double_recursion_is_exponential() {
        let code = "def fib(n):\n    if n < 2:\n        return n\n    return fib(n - 1) + fib(n - 2)\nprint(fib(int(input_data)))";
        assert_eq!(
            estimate(code, Language::Python).class,
            ComplexityClass::Exponential
        );
    }

    #[test]
    fn test_javascript_braces() {
        let code = r#"
let out = 0;
for (let i = 0; i < n; i++) {
    for (let j = 0; j < n; j++) {
        for (let k = 0; k < n; k++) {
            out++;
        }
    }
}
console.log(out);
"#;
        assert_eq!(estimate(code, Language::JavaScript).class, ComplexityClass::Cubic);
    }

    #[test]
    fn test_javascript_braceless_loop() {
        let code = "let s = 0;\nfor (const c of input_data)\n    s += Number(c);\nconsole.log(s);";
        assert_eq!(estimate(code, Language::JavaScript).class, ComplexityClass::Linear);
    }
}
