use colored::*;
use console::style;

pub fn init() {
    // Enable colored output on Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();
}

pub fn info(message: &str) {
    println!("{} {}", style("ℹ").blue(), message);
}

pub fn success(message: &str) {
    println!("{} {}", style("✓").green(), message.green());
}

pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red(), message.red());
}

pub fn warn(message: &str) {
    println!("{} {}", style("⚠").yellow(), message.yellow());
}

pub fn hint(message: &str) {
    println!("{} {}", style("💡").cyan(), message.dimmed());
}

pub fn section(title: &str) {
    println!("\n{}", title.bold().underline());
}

pub fn prompt_confirm(message: &str, default: bool) -> bool {
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(default)
        .interact()
        .unwrap_or(default)
}

pub fn prompt_select<T: ToString>(message: &str, items: &[T], default: usize) -> usize {
    dialoguer::Select::new()
        .with_prompt(message)
        .items(items)
        .default(default)
        .interact()
        .unwrap_or(default)
}
