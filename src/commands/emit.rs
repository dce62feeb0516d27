use colored::*;
use eyre::{Context, Result};

use super::parse_payload;
use crate::eventlog::{
    self,
    delivery::{DeliveryMode, DeliveryOverrides, Method},
};

pub struct EmitArgs {
    pub event_type: String,
    pub data: Option<String>,
    pub element: Option<String>,
    pub method: Option<Method>,
    pub blocking: bool,
    pub url: Option<String>,
}

impl EmitArgs {
    fn overrides(&self) -> DeliveryOverrides {
        DeliveryOverrides {
            url: self.url.clone(),
            method: self.method,
            mode: self.blocking.then_some(DeliveryMode::Blocking),
        }
    }
}

pub fn run(args: EmitArgs) -> Result<()> {
    let payload = parse_payload(args.data.as_deref());

    log::info!("Emitting {} (element: {:?})", args.event_type, args.element);

    let handle = eventlog::log_event(&args.event_type, &payload, args.element.as_deref(), &args.overrides())
        .with_context(|| format!("Failed to log {}", args.event_type))?;

    let receipt = handle
        .wait()
        .with_context(|| format!("Failed to deliver {}", args.event_type))?;

    println!(
        "{} Delivered {} (status {})",
        "✓".green(),
        args.event_type.cyan(),
        receipt.status
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> EmitArgs {
        EmitArgs {
            event_type: "example".to_string(),
            data: None,
            element: None,
            method: None,
            blocking: false,
            url: None,
        }
    }

    #[test]
    fn test_overrides_empty_by_default() {
        assert_eq!(args().overrides(), DeliveryOverrides::default());
    }

    #[test]
    fn test_overrides_from_flags() {
        let overrides = EmitArgs {
            method: Some(Method::Get),
            blocking: true,
            url: Some("/track".to_string()),
            ..args()
        }
        .overrides();

        assert_eq!(overrides.method, Some(Method::Get));
        assert_eq!(overrides.mode, Some(DeliveryMode::Blocking));
        assert_eq!(overrides.url.as_deref(), Some("/track"));
    }
}
