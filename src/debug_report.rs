//! ANSI diagnostic report for the `streamrouter` CLI's `test` subcommand.
//!
//! Same `Palette`-driven approach as the teacher's `debug_report.rs`: a tiny
//! color-or-plain helper, then a handful of `print_*` functions rendering
//! one self-contained block each.

use streamrouter::StreamTestReport;

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const RED: &str = "\x1b[31m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_test_match(reports: &[StreamTestReport], color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint("⚙  test_match", ansi::CYAN)));

    if reports.is_empty() {
        println!("{}", palette.dim("  No streams loaded"));
        return;
    }

    let matched_count = reports.iter().filter(|r| r.matched).count();
    println!(
        "\n{}",
        palette.paint(format!("━━━ Streams ({matched_count}/{} matched) ━━━", reports.len()), ansi::GRAY)
    );

    for report in reports {
        print_stream(report, &palette);
    }
    println!();
}

fn print_stream(report: &StreamTestReport, palette: &ansi::Palette) {
    let header = if report.matched {
        palette.paint(format!("✓ {}", report.stream_id), ansi::GREEN)
    } else {
        palette.paint(format!("✗ {}", report.stream_id), ansi::RED)
    };
    println!("  {}", palette.bold(header));

    if report.rules.is_empty() {
        println!("    {}", palette.dim("no valid rules — can never match"));
        return;
    }

    for rule in &report.rules {
        let mark = if rule.matched { palette.paint("✓", ansi::GREEN) } else { palette.paint("✗", ansi::RED) };
        println!(
            "    {} {} {}",
            mark,
            palette.paint(&rule.rule_type, ansi::BLUE),
            palette.dim(format!("field={}", rule.field)),
        );
        if let Some(detail) = &rule.detail {
            println!("      {}", palette.dim(detail));
        }
    }
}
