//! Notification option types and validation.
//!
//! Options keep the loose wire shape they have on the bridge (every field
//! optional, camelCase names); validation checks presence and per-template
//! exclusivity, reporting the first violation.

use portico_core::error::{PorticoError, Result};
use serde::{Deserialize, Serialize};

/// Notification template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Basic,
    Image,
    List,
    Progress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotificationButton {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Options for `create`/`update`, as carried over the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub template_type: Option<TemplateType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<NotificationButton>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<NotificationItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i64>,
}

impl NotificationOptions {
    /// A complete basic notification.
    pub fn basic(
        icon_url: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            template_type: Some(TemplateType::Basic),
            icon_url: Some(icon_url.into()),
            title: Some(title.into()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, template_type: TemplateType) -> Self {
        self.template_type = Some(template_type);
        self
    }

    /// Validate for `create`: a template type and all baseline fields are
    /// required.
    pub fn validate_create(&self) -> Result<TemplateType> {
        let template = self
            .template_type
            .ok_or_else(|| invalid("Property 'type' is required"))?;
        self.validate_with(template)
    }

    /// Validate for `update`: the template type may be omitted and falls
    /// back to the stored notification's type.
    pub fn validate_update(&self, existing: Option<TemplateType>) -> Result<TemplateType> {
        let template = self
            .template_type
            .or(existing)
            .ok_or_else(|| invalid("Property 'type' is required"))?;
        self.validate_with(template)
    }

    fn validate_with(&self, template: TemplateType) -> Result<TemplateType> {
        for (present, name) in [
            (self.icon_url.is_some(), "iconUrl"),
            (self.title.is_some(), "title"),
            (self.message.is_some(), "message"),
        ] {
            if !present {
                return Err(invalid(format!("Property '{name}' is required")));
            }
        }

        if let Some(buttons) = &self.buttons {
            if buttons.iter().any(|b| b.title.is_none()) {
                return Err(invalid("Buttons must specify a title"));
            }
        }

        if self.image_url.is_some() && template != TemplateType::Image {
            return Err(invalid(
                "Property 'imageUrl' may only be in notifications of type 'image'",
            ));
        }

        match &self.items {
            Some(_) if template != TemplateType::List => {
                return Err(invalid(
                    "Property 'items' may only be in notifications of type 'list'",
                ));
            }
            Some(items) => {
                for item in items {
                    if item.title.is_none() {
                        return Err(invalid("List items must specify a title"));
                    }
                    if item.message.is_none() {
                        return Err(invalid("List items must contain a message"));
                    }
                }
            }
            None => {}
        }

        if let Some(progress) = self.progress {
            if template != TemplateType::Progress {
                return Err(invalid(
                    "Property 'progress' may only be in notifications of type 'progress'",
                ));
            }
            if !(0..=100).contains(&progress) {
                return Err(invalid("Property 'progress' must be between 0 and 100"));
            }
        }

        Ok(template)
    }
}

fn invalid(msg: impl Into<String>) -> PorticoError {
    PorticoError::Validation(format!("Invalid notification options. {}", msg.into()))
}
