//! The shipping aggregator, backed by Melhor Envio.
use chrono::{DateTime, NaiveDateTime, Utc};
use gateway_tools::{
    me_objects::{
        MeCalculateRequest,
        MeCartOptions,
        MeCartParty,
        MeCartProduct,
        MeCartRequest,
        MeOptions,
        MeOrdersRequest,
        MePostalCode,
        MeProduct,
        MeQuote,
        MeTag,
        MeTracking,
        MeVolume,
    },
    parse_decimal_amount,
    GatewayApiError,
    MelhorEnvioApi,
    MelhorEnvioConfig,
};
use log::*;
use settlement_engine::{
    shipping_objects::{
        LabelParty,
        LabelRequest,
        PurchasedLabel,
        ShippingOption,
        ShippingQuoteRequest,
        TrackingEvent,
        TrackingInfo,
    },
    traits::{GatewayError, ShippingAggregator},
};

use crate::integrations::gateway_error;

#[derive(Clone)]
pub struct MelhorEnvioAggregator {
    api: MelhorEnvioApi,
}

impl MelhorEnvioAggregator {
    pub fn new(config: MelhorEnvioConfig) -> Result<Self, GatewayApiError> {
        let api = MelhorEnvioApi::new(config)?;
        Ok(Self { api })
    }

    fn check_configured(&self) -> Result<(), GatewayError> {
        if !self.api.config().is_configured() {
            return Err(GatewayError::NotConfigured("No Melhor Envio token has been set".into()));
        }
        Ok(())
    }
}

impl ShippingAggregator for MelhorEnvioAggregator {
    async fn quote(&self, request: ShippingQuoteRequest) -> Result<Vec<ShippingOption>, GatewayError> {
        self.check_configured()?;
        let quotes = self.api.calculate(to_calculate_request(request)).await.map_err(gateway_error)?;
        Ok(quotes.into_iter().filter_map(to_shipping_option).collect())
    }

    async fn track(&self, tracking_code: &str) -> Result<TrackingInfo, GatewayError> {
        self.check_configured()?;
        match self.api.track(tracking_code).await.map_err(gateway_error)? {
            Some(tracking) => Ok(to_tracking_info(tracking_code, tracking)),
            None => Err(GatewayError::Refused(format!("{tracking_code} is not a known tracking code"))),
        }
    }

    /// Adds the label to the cart, pays for it and asks for it to be generated.
    async fn purchase_label(&self, request: LabelRequest) -> Result<PurchasedLabel, GatewayError> {
        self.check_configured()?;
        let item = self.api.add_to_cart(to_cart_request(request)).await.map_err(gateway_error)?;
        let price = match &item.price {
            Some(amount) => parse_decimal_amount(&amount.to_decimal_string()).map_err(gateway_error)?,
            None => return Err(GatewayError::Refused(format!("Cart item {} has no price", item.id))),
        };
        let ids = MeOrdersRequest::single(&item.id);
        self.api.checkout(ids.clone()).await.map_err(gateway_error)?;
        if let Err(e) = self.api.generate_labels(ids).await {
            // A paid label can still be generated later, when it is printed.
            warn!("📦️ Label {} was paid for but not generated yet. {e}", item.id);
        }
        Ok(PurchasedLabel { label_id: item.id, protocol: item.protocol, price })
    }

    async fn label_url(&self, label_id: &str) -> Result<String, GatewayError> {
        self.check_configured()?;
        self.api.print_labels(MeOrdersRequest::single(label_id)).await.map_err(gateway_error)
    }

    async fn cancel_label(&self, label_id: &str) -> Result<(), GatewayError> {
        self.check_configured()?;
        self.api.cancel_labels(MeOrdersRequest::single(label_id)).await.map_err(gateway_error)?;
        Ok(())
    }
}

fn to_cart_party(party: LabelParty) -> MeCartParty {
    MeCartParty {
        name: party.name,
        email: party.email,
        document: party.document,
        address: party.street,
        number: party.number,
        district: party.district,
        city: party.city,
        state_abbr: party.state,
        country_id: "BR".into(),
        postal_code: party.postal_code,
        ..Default::default()
    }
}

fn to_cart_request(request: LabelRequest) -> MeCartRequest {
    let value = request.declared_value.as_decimal();
    let package = request.package;
    MeCartRequest {
        service: request.service_id,
        agency: None,
        from: to_cart_party(request.from),
        to: to_cart_party(request.to),
        products: vec![MeCartProduct { name: request.product_title, quantity: 1, unitary_value: value }],
        volumes: vec![MeVolume {
            width: package.width_cm,
            height: package.height_cm,
            length: package.length_cm,
            weight: package.weight_kg,
        }],
        options: MeCartOptions {
            insurance_value: value,
            receipt: false,
            own_hand: false,
            reverse: false,
            non_commercial: true,
            platform: "Apega Desapega".into(),
            tags: vec![MeTag { tag: format!("Pedido #{}", request.order_number), url: None }],
        },
    }
}

fn to_calculate_request(request: ShippingQuoteRequest) -> MeCalculateRequest {
    let insurance_value = request.declared_value.as_decimal();
    let package = request.package;
    MeCalculateRequest {
        // An empty origin is replaced by the account's default origin.
        from: MePostalCode { postal_code: request.from_zipcode.unwrap_or_default() },
        to: MePostalCode { postal_code: request.to_zipcode },
        products: vec![MeProduct {
            id: "1".to_string(),
            width: package.width_cm,
            height: package.height_cm,
            length: package.length_cm,
            weight: package.weight_kg,
            insurance_value,
            quantity: 1,
        }],
        options: MeOptions { insurance_value, receipt: false, own_hand: false },
        services: String::new(),
    }
}

fn to_shipping_option(quote: MeQuote) -> Option<ShippingOption> {
    let price = quote.effective_price().map(parse_decimal_amount)?;
    let price = match price {
        Ok(p) => p,
        Err(e) => {
            warn!("📦️ Dropping the {} quote. {e}", quote.name);
            return None;
        },
    };
    let delivery_days = quote.effective_delivery_time();
    let range = quote.delivery_range.unwrap_or_default();
    let (delivery_min, delivery_max) =
        if range.max == 0 { (delivery_days, delivery_days) } else { (range.min, range.max) };
    Some(ShippingOption {
        id: quote.id,
        company: quote.company_name(),
        name: quote.name,
        price,
        delivery_days,
        delivery_min,
        delivery_max,
    })
}

fn to_tracking_info(tracking_code: &str, tracking: MeTracking) -> TrackingInfo {
    let events = tracking
        .tracking
        .iter()
        .map(|e| TrackingEvent {
            status: e.status.clone().unwrap_or_default(),
            message: e.message.clone(),
            date: e.date.clone(),
            location: e.location(),
        })
        .collect();
    TrackingInfo {
        tracking_code: tracking_code.to_string(),
        current_status: tracking.status.unwrap_or_else(|| "unknown".to_string()),
        delivered_at: tracking.delivered_at.as_deref().and_then(parse_aggregator_date),
        events,
    }
}

/// The aggregator uses `2024-06-10 14:32:00` (UTC) in most places and RFC 3339 in a few.
fn parse_aggregator_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|d| d.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc)))
        .map_err(|e| debug!("📦️ Could not parse aggregator date '{s}'. {e}"))
        .ok()
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use settle_common::Cents;
    use settlement_engine::shipping_objects::PackageDimensions;

    use super::*;

    #[test]
    fn calculate_request() {
        let request = ShippingQuoteRequest {
            to_zipcode: "01310100".into(),
            from_zipcode: None,
            declared_value: Cents::from(12_990),
            package: PackageDimensions::default(),
        };
        let me = to_calculate_request(request);
        assert_eq!(me.from.postal_code, "");
        assert_eq!(me.to.postal_code, "01310100");
        assert_eq!(me.products.len(), 1);
        assert!((me.options.insurance_value - 129.9).abs() < 1e-9);
    }

    #[test]
    fn cart_request() {
        let party = |name: &str, postal_code: &str| LabelParty {
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            document: Some("12345678909".into()),
            street: "Rua Augusta".into(),
            number: "1500".into(),
            district: "Consolação".into(),
            city: "São Paulo".into(),
            state: "SP".into(),
            postal_code: postal_code.into(),
        };
        let request = LabelRequest {
            service_id: 2,
            order_number: "AP17180000001234".into(),
            from: party("Ana", "99010000"),
            to: party("Bruno", "01304001"),
            product_title: "Jaqueta jeans".into(),
            declared_value: Cents::from(12_990),
            package: PackageDimensions::default(),
        };
        let me = to_cart_request(request);
        assert_eq!(me.service, 2);
        assert_eq!(me.agency, None);
        assert_eq!(me.from.postal_code, "99010000");
        assert_eq!(me.to.name, "Bruno");
        assert_eq!(me.to.state_abbr, "SP");
        assert_eq!(me.to.country_id, "BR");
        assert!((me.products[0].unitary_value - 129.9).abs() < 1e-9);
        assert!(me.options.non_commercial);
        assert_eq!(me.options.tags[0].tag, "Pedido #AP17180000001234");
        let json = serde_json::to_value(&me).unwrap();
        assert_eq!(json["agency"], serde_json::Value::Null);
        assert_eq!(json["volumes"][0]["width"], 20);
    }

    #[test]
    fn quotes_become_options() {
        let json = r#"[
            {"id": 1, "name": "PAC", "price": "21.90", "custom_price": "19.80", "delivery_time": 8,
             "delivery_range": {"min": 6, "max": 8}, "company": {"id": 1, "name": "Correios"}},
            {"id": 2, "name": "SEDEX", "price": "R$ 38", "delivery_time": 3},
            {"id": 3, "name": ".Package", "error": "Serviço indisponível para o trecho."}
        ]"#;
        let quotes: Vec<MeQuote> = serde_json::from_str(json).unwrap();
        let options = quotes.into_iter().filter_map(to_shipping_option).collect::<Vec<_>>();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].price, Cents::from(1_980));
        assert_eq!(options[0].company, "Correios");
        assert_eq!((options[0].delivery_min, options[0].delivery_max), (6, 8));
    }

    #[test]
    fn tracking() {
        let json = r#"{"status": "delivered", "delivered_at": "2024-06-10 14:32:00",
            "tracking": [{"status": "posted", "message": "Objeto postado", "city": "Passo Fundo", "state": "RS"}]}"#;
        let tracking: MeTracking = serde_json::from_str(json).unwrap();
        let info = to_tracking_info("BR123456789BR", tracking);
        assert!(info.is_delivered());
        assert_eq!(info.delivered_at, Some(Utc.with_ymd_and_hms(2024, 6, 10, 14, 32, 0).unwrap()));
        assert_eq!(info.events[0].location.as_deref(), Some("Passo Fundo/RS"));
        assert_eq!(parse_aggregator_date("yesterday"), None);
    }
}
