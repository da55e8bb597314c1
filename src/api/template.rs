//! Template sends and template sync.

use super::SendError;
use crate::{
    models::{
        account::Account,
        template::{self, NewTemplate, Template},
    },
    repo,
    webhook::whatsapp::{
        client::ImplWhatsAppApi,
        outgoing_schemas::{
            OutgoingTemplateContent, TemplateComponent, TemplateLanguage, TemplateParameter,
        },
    },
};
use std::collections::{BTreeMap, BTreeSet};

/// Requires the supplied variable keys to match the template placeholders 1:1.
pub fn validate_variables(
    template: &Template,
    variables: &BTreeMap<String, String>,
) -> Result<(), SendError> {
    let placeholders = template.placeholders();
    let supplied = variables.keys().cloned().collect::<BTreeSet<_>>();

    if placeholders == supplied {
        return Ok(());
    }

    let missing = placeholders.difference(&supplied).cloned().collect::<Vec<_>>();
    let unexpected = supplied.difference(&placeholders).cloned().collect::<Vec<_>>();

    let mut problems = Vec::new();
    if !missing.is_empty() {
        problems.push(format!("missing variables: {}", missing.join(", ")));
    }
    if !unexpected.is_empty() {
        problems.push(format!("unexpected variables: {}", unexpected.join(", ")));
    }

    Err(SendError::MissingVariable(format!(
        "template {}: {}",
        template.name,
        problems.join("; ")
    )))
}

fn component_parameters(
    text: &str,
    variables: &BTreeMap<String, String>,
) -> Vec<TemplateParameter> {
    let mut names = template::placeholder_names(text);

    if names.iter().all(|name| template::is_positional(name)) {
        // {{1}}, {{2}}, ... are bound by position, not by order of appearance
        names.sort_by_key(|name| name.parse::<u32>().unwrap_or(u32::MAX));
        return names
            .into_iter()
            .map(|name| TemplateParameter::positional(variables.get(&name).cloned().unwrap_or_default()))
            .collect();
    }

    names
        .into_iter()
        .map(|name| {
            let value = variables.get(&name).cloned().unwrap_or_default();
            TemplateParameter::named(name, value)
        })
        .collect()
}

/// Provider payload for a validated template send.
pub fn build_template_content(
    template: &Template,
    variables: &BTreeMap<String, String>,
) -> OutgoingTemplateContent {
    let sections = [
        ("header", template.header_text.as_deref()),
        ("body", Some(template.body_text.as_str())),
    ];

    let components = sections
        .into_iter()
        .filter_map(|(component_type, text)| {
            let parameters = component_parameters(text?, variables);
            (!parameters.is_empty()).then(|| TemplateComponent {
                component_type: component_type.to_string(),
                parameters,
            })
        })
        .collect();

    OutgoingTemplateContent {
        name: template.name.clone(),
        language: TemplateLanguage {
            code: template.language.clone(),
        },
        components,
    }
}

/// Replaces the stored templates of the account with the provider's catalog.
///
/// Templates no longer returned by the provider are kept as they are.
pub async fn sync_templates(
    repo: &repo::ImplGatewayRepo,
    client: &ImplWhatsAppApi,
    account: &Account,
) -> Result<usize, SendError> {
    let _span = logfire::span!("sync_templates").entered();

    let templates = client
        .fetch_message_templates(account)
        .await?
        .into_iter()
        .map(NewTemplate::from)
        .collect::<Vec<_>>();

    let synced = repo.upsert_templates(account.id, &templates).await?;

    logfire::info!(
        "Synced {count} templates for account {account_id}",
        count = synced.to_string(),
        account_id = account.id.to_string()
    );

    Ok(synced)
}
