// Compiled-in registry of partner (reseller) endpoints. Each tolino
// reseller runs its own OAuth and upload endpoints; the config file only
// stores the partner id.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// OAuth client identifier, scope and endpoint URLs of one reseller.
#[derive(Debug, Clone)]
pub struct PartnerSetting {
    pub client_id: String,
    pub scope: String,
    pub token_url: String,
    pub upload_url: String,
}

static PARTNERS: Lazy<HashMap<u32, PartnerSetting>> = Lazy::new(|| {
    HashMap::from([
        // Thalia.de
        (
            3,
            PartnerSetting {
                client_id: "webreader".to_string(),
                scope: "SCOPE_BOSH".to_string(),
                token_url: "https://thalia.de/auth/oauth2/token".to_string(),
                upload_url: "https://bosh.pageplace.de/bosh/rest/upload".to_string(),
            },
        ),
    ])
});

/// Look up the settings for a partner id from the compiled-in table.
pub fn lookup(partner_id: u32) -> Result<PartnerSetting> {
    PARTNERS
        .get(&partner_id)
        .cloned()
        .ok_or(Error::UnknownPartner(partner_id))
}
