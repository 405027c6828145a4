use crate::impl_anoncreds_object_identifier;

impl_anoncreds_object_identifier!(IssuerId, LEGACY_DID_IDENTIFIER);
