use owo_colors::OwoColorize;
use relsim_runtime::Reporter;
use relsim_types::Distribution;

/// Prints a rendered report, colorizing the header and recommendation lines
/// when writing to a terminal. The reporter itself stays plain-text
/// (SPEC_FULL.md §4.7) — all ANSI styling lives here.
pub(crate) fn print_report(distribution: &Distribution, colorize: bool) {
    let report = Reporter::new().render(distribution);
    if !colorize {
        println!("{}", report);
        return;
    }
    for line in report.lines() {
        if line.starts_with("Ensemble report") {
            println!("{}", line.bold());
        } else if line.contains("Recommendation:") {
            match distribution.homeostasis_rate() {
                Some(rate) if rate >= 0.7 => println!("{}", line.green()),
                Some(rate) if rate >= 0.4 => println!("{}", line.yellow()),
                Some(_) => println!("{}", line.red()),
                None => println!("{}", line),
            }
        } else {
            println!("{}", line);
        }
    }
}
