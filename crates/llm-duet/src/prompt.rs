//! Prompt templating.

use minijinja::Environment;
use serde::Serialize;

/// Renders a prompt from a template string and a serializable context.
///
/// Templates use minijinja syntax (`{{ name }}`, `{% for %}`); no HTML
/// escaping is applied.
pub fn render_prompt<T: Serialize>(template: &str, context: T) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_template("prompt", template)?;
    let tmpl = env.get_template("prompt")?;
    tmpl.render(context)
}

/// Creates a prompt string from a template and key-value pairs.
///
/// # Example
///
/// ```
/// use llm_duet::prompt;
///
/// let p = prompt!("{{ who }} says {{ what }}", who = "Alice", what = "hi").unwrap();
/// assert_eq!(p, "Alice says hi");
/// ```
#[macro_export]
macro_rules! prompt {
    ($template:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::prompt::render_prompt($template, $crate::minijinja::context!($($key => $value),*))
    };
}
