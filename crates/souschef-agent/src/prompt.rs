use minijinja::{context, Environment};

use souschef_core::error::{Error, Result};

use crate::model::Passage;
use crate::registry::ToolSpec;

const SELECTION: &str = r#"You are a culinary research assistant with access to reference tools.
{% if max_tool_calls > 1 %}You may call up to {{ max_tool_calls }} tools.{% else %}Call at most one tool.{% endif %} If no tool applies, answer directly.

Tools:
{% for tool in tools %}- {{ tool.name }}: {{ tool.description }}
{% endfor %}
{%- if context %}
Already retrieved:
{% for p in context %}[{{ p.tool }}] {{ p.text }}
{% endfor %}
{%- endif %}
Question: {{ query }}
"#;

const COMPOSITION: &str = r#"Answer the question. Use the reference passages when they are relevant and name the source of every fact taken from them.
{% if context %}
Reference passages:
{% for p in context %}[{{ loop.index }}] ({{ p.tool }}, {{ p.source_path }}, score {{ p.score|round(3) }}) {{ p.text }}
{% endfor %}
{%- else %}
No reference passages were retrieved.
{% endif %}
Question: {{ query }}
"#;

pub struct PromptRenderer {
    env: Environment<'static>,
}

impl PromptRenderer {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("selection", SELECTION).map_err(template_error)?;
        env.add_template("composition", COMPOSITION).map_err(template_error)?;
        Ok(Self { env })
    }

    pub fn selection(&self, query: &str, tools: &[ToolSpec], context: &[Passage], max_tool_calls: usize) -> Result<String> {
        self.env
            .get_template("selection")
            .and_then(|t| t.render(context! { query, tools, context, max_tool_calls }))
            .map_err(template_error)
    }

    pub fn composition(&self, query: &str, context: &[Passage]) -> Result<String> {
        self.env
            .get_template("composition")
            .and_then(|t| t.render(context! { query, context }))
            .map_err(template_error)
    }
}

fn template_error(e: minijinja::Error) -> Error {
    Error::InvalidConfig(format!("prompt template: {e}"))
}
