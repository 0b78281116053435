//! Demo tenant: a few customers, the standard automations, and a short burst
//! of events so the daemon has something to log.

use cdp_core::automation::{
    ActionType, Automation, AutomationAction, Segment, SegmentKind, TriggerType,
};
use cdp_core::event::{Event, EventType};
use cdp_core::profile::CustomerProfile;
use cdp_pipeline::CdpService;
use serde_json::json;
use tracing::info;

pub const TENANT: &str = "demo";

const ONE_DAY_MS: u64 = 24 * 60 * 60 * 1000;

pub async fn seed(service: &CdpService) -> anyhow::Result<()> {
    info!(tenant_id = TENANT, "Seeding demo tenant");

    let vip = service
        .create_segment(Segment::new(TENANT, "Repeat buyers", SegmentKind::Static))
        .await?;

    let mut welcome = Automation::new(
        TENANT,
        "Welcome Series",
        TriggerType::Welcome,
        vec![
            AutomationAction::new(ActionType::SendEmail, 0)
                .with_config("subject", json!("Welcome aboard"))
                .with_config("content", json!("welcome_email")),
            AutomationAction::new(ActionType::Delay, 1).with_config("duration", json!(ONE_DAY_MS)),
            AutomationAction::new(ActionType::SendPush, 2)
                .with_config("title", json!("Finish setting up your profile")),
        ],
    );
    welcome.description = "Onboarding sequence for new sign-ups".to_string();

    let mut cart = Automation::new(
        TENANT,
        "Abandoned Cart Recovery",
        TriggerType::CartAbandoned,
        vec![
            AutomationAction::new(ActionType::SendEmail, 0)
                .with_config("subject", json!("You left something in your cart"))
                .with_config("content", json!("abandoned_cart")),
            AutomationAction::new(ActionType::AddTag, 1).with_config("tag", json!("cart_abandoner")),
        ],
    );
    cart.description = "Nudge shoppers who left items behind".to_string();

    let mut post_purchase = Automation::new(
        TENANT,
        "Post-purchase",
        TriggerType::Purchase,
        vec![
            AutomationAction::new(ActionType::RemoveTag, 0).with_config("tag", json!("cart_abandoner")),
            AutomationAction::new(ActionType::AddToSegment, 1).with_config("segment_id", json!(vip.id)),
            AutomationAction::new(ActionType::Webhook, 2)
                .with_config("url", json!("https://hooks.example.com/orders"))
                .with_config("event", json!("order_placed")),
            AutomationAction::new(ActionType::SendSms, 3)
                .with_config("content", json!("Thanks for your order!")),
        ],
    );
    post_purchase.description = "Receipt, segmenting and order webhook".to_string();

    for automation in [welcome, cart, post_purchase] {
        service.create_automation(automation).await?;
    }

    let customers = [
        ("cust-ada", "ada@example.com", "+15550100"),
        ("cust-grace", "grace@example.com", "+15550101"),
        ("cust-linus", "linus@example.com", ""),
    ];
    for (id, email, phone) in customers {
        service
            .save_customer(CustomerProfile::new(TENANT, id).with_email(email).with_phone(phone))
            .await?;
    }

    let events = [
        Event::new(TENANT, Some("cust-ada".into()), "sess-1", EventType::Signup),
        Event::new(TENANT, Some("cust-ada".into()), "sess-1", EventType::ProductView)
            .with_property("category_id", json!("shoes"))
            .with_property("brand_id", json!("acme")),
        Event::new(TENANT, Some("cust-grace".into()), "sess-2", EventType::AddToCart)
            .with_property("sku", json!("sku-42")),
        Event::new(TENANT, Some("cust-linus".into()), "sess-3", EventType::Purchase)
            .with_property("amount", json!(249.9)),
        Event::new(TENANT, None, "sess-4", EventType::PageView).with_property("url", json!("/")),
    ];
    for event in events {
        service.track_event(event.with_source("demo")).await?;
    }

    info!(tenant_id = TENANT, "Demo tenant seeded");
    Ok(())
}
