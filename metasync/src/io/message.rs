//! Commit message rendering.

use anyhow::{Context, Result};
use minijinja::{Environment, UndefinedBehavior, context};

use crate::core::gate::short_digest;

/// Values available to the commit message template.
#[derive(Debug, Clone)]
pub struct MessageInputs<'a> {
    pub artifact: &'a str,
    pub digest: &'a str,
    pub run_id: &'a str,
    pub trigger: &'a str,
}

/// minijinja commit message template. Unknown variables are render errors.
#[derive(Debug, Clone)]
pub struct CommitMessageTemplate {
    source: String,
}

impl CommitMessageTemplate {
    /// Parse `source`, failing on syntax errors.
    pub fn new(source: &str) -> Result<Self> {
        let env = environment();
        env.template_from_str(source)
            .context("parse commit message template")?;
        Ok(Self {
            source: source.to_string(),
        })
    }

    pub fn render(&self, inputs: &MessageInputs<'_>) -> Result<String> {
        let rendered = environment()
            .render_str(
                &self.source,
                context! {
                    artifact => inputs.artifact,
                    digest => inputs.digest,
                    digest_short => short_digest(inputs.digest),
                    run_id => inputs.run_id,
                    trigger => inputs.trigger,
                },
            )
            .context("render commit message")?;
        let message = rendered.trim().to_string();
        if message.is_empty() {
            anyhow::bail!("commit message template rendered empty");
        }
        Ok(message)
    }
}

fn environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> MessageInputs<'static> {
        MessageInputs {
            artifact: "metadata.xml",
            digest: "0123456789abcdef0123",
            run_id: "20260101T000000Z-abc1234",
            trigger: "dispatch:sync",
        }
    }

    #[test]
    fn renders_default_template() {
        let template =
            CommitMessageTemplate::new("Sync {{ artifact }} ({{ digest_short }})").expect("parse");
        assert_eq!(
            template.render(&inputs()).expect("render"),
            "Sync metadata.xml (0123456789ab)"
        );
    }

    #[test]
    fn renders_multiline_template() {
        let template = CommitMessageTemplate::new(
            "Update {{ artifact }}\n\nRun: {{ run_id }}\nTrigger: {{ trigger }}\n",
        )
        .expect("parse");
        let message = template.render(&inputs()).expect("render");
        assert!(message.starts_with("Update metadata.xml\n\n"));
        assert!(message.ends_with("Trigger: dispatch:sync"));
    }

    #[test]
    fn rejects_syntax_errors() {
        assert!(CommitMessageTemplate::new("{% if %}").is_err());
    }

    #[test]
    fn unknown_variables_fail_to_render() {
        let template = CommitMessageTemplate::new("Sync {{ nope }}").expect("parse");
        assert!(template.render(&inputs()).is_err());
    }

    #[test]
    fn empty_render_is_an_error() {
        let template = CommitMessageTemplate::new("   ").expect("parse");
        assert!(template.render(&inputs()).is_err());
    }
}
