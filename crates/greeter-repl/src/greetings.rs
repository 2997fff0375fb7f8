//! Greeting rendering for the languages the greeter ships with.

use greeter_types::DEFAULT_LANGUAGE;

/// Render a greeting for `name` in `language`, falling back to the default
/// language when the requested one is not available.
pub fn greet(language: &str, name: &str) -> String {
    match language {
        "en" => format!("Hello {}", name),
        "fr" => format!("Bonjour {}", name),
        "bg" => format!("Здравей {}", name),
        _ => greet(DEFAULT_LANGUAGE, name),
    }
}
