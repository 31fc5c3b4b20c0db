//! Subscription filter matching
//!
//! Pure predicates over resolved resource/alarm attributes. Filters are
//! structurally validated when the subscription is created, but stored
//! data can still be anything - the matchers treat malformed filter
//! fields as non-matching rather than raising.

use serde_json::Value;

use crate::Resource;

/// Does a subscription filter accept a resource event?
///
/// An absent or empty filter matches unconditionally. Every field present
/// in the filter must match the resource's *stored* state (logical AND);
/// fields absent from the filter are wildcards. When the resource is not
/// in the inventory (e.g. the event is a deletion), pool/type fields have
/// nothing to contradict and do not reject.
pub fn matches_resource_filter(filter: Option<&Value>, resource: Option<&Resource>) -> bool {
    let Some(filter) = filter else {
        return true;
    };

    let Some(fields) = filter.as_object() else {
        // Non-object filter: nothing we can interpret, match nothing.
        return false;
    };

    if fields.is_empty() {
        return true;
    }

    if let Some(wanted_pool) = fields.get("resourcePoolId")
        && let Some(resource) = resource
        && wanted_pool.as_str() != Some(resource.resource_pool_id.as_str())
    {
        return false;
    }

    if let Some(wanted_type) = fields.get("resourceTypeId")
        && let Some(resource) = resource
        && wanted_type.as_str() != Some(resource.resource_type_id.as_str())
    {
        return false;
    }

    true
}

/// Does a subscription filter accept an alarm on `resource_id`?
///
/// Only the `resourceId` field is consulted. A missing field is a
/// wildcard; a present field must equal the alarm's resource id, and a
/// malformed (non-string) value matches nothing.
pub fn matches_alarm_filter(filter: Option<&Value>, resource_id: &str) -> bool {
    let Some(filter) = filter else {
        return true;
    };

    let Some(fields) = filter.as_object() else {
        return false;
    };

    match fields.get("resourceId") {
        None | Some(Value::Null) => true,
        Some(wanted) => wanted.as_str() == Some(resource_id),
    }
}
