//! CLI 格式化输出
//!
//! 提供命令行友好的错误显示和源码上下文打印。

use hotscript_api::{Engine, EngineError};

/// 错误行前后显示的上下文行数
const CONTEXT_LINES: usize = 5;

/// 打印错误，能定位到源码时附带上下文
///
/// 被导入模块中的编译错误显示该模块的源码。
pub fn print_error(engine: &Engine, e: &EngineError) {
    eprintln!("❌ {}", e.to_report());

    let (Some(line), Some(column)) = (e.line(), e.column()) else {
        return;
    };
    let resource = match (e.module(), e.script()) {
        (Some(module), _) => engine.module_resource(module),
        (None, Some(script)) => script.to_string(),
        (None, None) => return,
    };
    if let Ok(source) = engine.source(&resource) {
        print_source_context(&source, line, column);
    }
}

/// 打印源代码上下文（显示错误行前后几行）
pub fn print_source_context(source: &str, error_line: usize, error_col: usize) {
    if let Some(rendered) = render_source_context(source, error_line, error_col) {
        eprint!("{}", rendered);
    }
}

/// 渲染源代码上下文，行号越界时返回 None
pub fn render_source_context(source: &str, error_line: usize, error_col: usize) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    let total_lines = lines.len();

    if error_line == 0 || error_line > total_lines {
        return None;
    }

    let start_line = error_line.saturating_sub(CONTEXT_LINES).max(1);
    let end_line = (error_line + CONTEXT_LINES).min(total_lines);

    // 行号的最大宽度用于对齐
    let width = end_line.to_string().len();
    let separator = "-".repeat(width + 1);

    let mut out = format!("{}|--\n", separator);
    for line_idx in start_line..=end_line {
        out.push_str(&format!("{:>width$} | {}\n", line_idx, lines[line_idx - 1]));
        if line_idx == error_line {
            // 指向错误位置的标记
            let marker = " ".repeat(error_col.saturating_sub(1));
            out.push_str(&format!("{} | {}^\n", " ".repeat(width), marker));
        }
    }
    out.push_str(&format!("{}|--\n", separator));
    Some(out)
}
