//! Folds per-shop offers into per-item groups.
//!
//! Both listing paths go through here: flat offers are grouped by
//! `(set_code, name)`, and groups pre-built by the server are re-keyed and
//! have their derived fields recomputed the same way.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{Offer, OfferGroupPayload};

pub type GroupKey = (Option<String>, String);

/// All offers for one catalogue item.
///
/// `best_price` and `any_in_stock` are derived from `offers` and are rebuilt
/// from scratch every time the member list changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferGroup {
    set_code: Option<String>,
    name: String,
    image_url: Option<String>,
    best_price: Option<Decimal>,
    any_in_stock: bool,
    offers: Vec<Offer>,
}

impl OfferGroup {
    fn seed(set_code: Option<String>, name: String, image_url: Option<String>) -> Self {
        Self {
            set_code,
            name,
            image_url,
            best_price: None,
            any_in_stock: false,
            offers: Vec::new(),
        }
    }

    pub fn set_code(&self) -> Option<&str> {
        self.set_code.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    /// Lowest price among in-stock offers with a known price.
    pub fn best_price(&self) -> Option<Decimal> {
        self.best_price
    }

    pub fn any_in_stock(&self) -> bool {
        self.any_in_stock
    }

    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    /// An offer is best when it is in stock at exactly the best price. Ties
    /// are all best.
    pub fn is_best(&self, offer: &Offer) -> bool {
        match self.best_price {
            Some(best) => offer.in_stock && offer.price == Some(best),
            None => false,
        }
    }

    pub fn best_offers(&self) -> impl Iterator<Item = &Offer> {
        self.offers.iter().filter(|offer| self.is_best(offer))
    }

    pub fn push_offer(&mut self, offer: Offer) {
        self.offers.push(offer);
        self.recompute();
    }

    fn recompute(&mut self) {
        self.best_price = self.offers.iter().filter_map(Offer::buyable_price).min();
        self.any_in_stock = self.offers.iter().any(|offer| offer.in_stock);
    }
}

/// Insertion-ordered index from key to group.
#[derive(Default)]
struct GroupIndex {
    groups: Vec<OfferGroup>,
    positions: HashMap<GroupKey, usize>,
}

impl GroupIndex {
    fn group_for(
        &mut self,
        set_code: &Option<String>,
        name: &str,
        image_url: impl FnOnce() -> Option<String>,
    ) -> &mut OfferGroup {
        let key = (set_code.clone(), name.to_string());
        let index = match self.positions.get(&key) {
            Some(&index) => index,
            None => {
                self.groups
                    .push(OfferGroup::seed(set_code.clone(), name.to_string(), image_url()));
                self.positions.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        &mut self.groups[index]
    }

    fn finish(mut self) -> Vec<OfferGroup> {
        for group in &mut self.groups {
            group.recompute();
        }
        self.groups
    }
}

/// Groups flat offers. Groups appear in the order their first member was
/// seen; members keep delivery order.
pub fn group_offers<I>(offers: I) -> Vec<OfferGroup>
where
    I: IntoIterator<Item = Offer>,
{
    let mut index = GroupIndex::default();
    for offer in offers {
        let set_code = offer.set_code.clone();
        let name = offer.name.clone();
        let image = offer.image_url.clone();
        index
            .group_for(&set_code, &name, move || image)
            .offers
            .push(offer);
    }
    index.finish()
}

/// Runs server-built groups through the same keying and derivation as
/// [`group_offers`]. Groups sharing a key are merged into the first one.
pub fn normalize_groups<I>(payloads: I) -> Vec<OfferGroup>
where
    I: IntoIterator<Item = OfferGroupPayload>,
{
    let mut index = GroupIndex::default();
    for payload in payloads {
        let OfferGroupPayload {
            set_code,
            name,
            image_url,
            offers,
        } = payload;
        let first_image = offers.first().and_then(|offer| offer.image_url.clone());
        index
            .group_for(&set_code, &name, move || image_url.or(first_image))
            .offers
            .extend(offers);
    }
    index.finish()
}

pub fn offer_count(groups: &[OfferGroup]) -> usize {
    groups.iter().map(|group| group.offers.len()).sum()
}
