//! Space summary generation.

use crate::llm::LanguageModel;
use crate::types::Space;

/// Generate a space summary from its assigned fact texts, honoring the
/// space's template when one is set.
pub async fn generate(
    model: &dyn LanguageModel,
    space: &Space,
    facts: &[String],
) -> anyhow::Result<String> {
    let summary = model.summarize(space, facts).await?;

    Ok(match &space.summary_template {
        Some(template) if template.contains("{summary}") => {
            template.replace("{summary}", &summary)
        }
        Some(template) => format!("{template}\n{summary}"),
        None => summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::NoopLanguageModel;
    use crate::types::SpaceType;

    #[tokio::test]
    async fn test_template_substitution() {
        let mut space = Space::new("Work", SpaceType::Classification, "owner");
        space.summary_template = Some("## Overview\n{summary}".to_string());

        let out = generate(&NoopLanguageModel, &space, &["alice leads billing".to_string()])
            .await
            .unwrap();
        assert!(out.starts_with("## Overview\n"));
        assert!(out.contains("alice leads billing"));
    }

    #[tokio::test]
    async fn test_plain_summary_without_template() {
        let space = Space::new("Work", SpaceType::Classification, "owner");
        let out = generate(&NoopLanguageModel, &space, &[]).await.unwrap();
        assert!(out.contains("Work"));
    }
}
