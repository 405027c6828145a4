use crate::impl_anoncreds_object_identifier;

impl_anoncreds_object_identifier!(RevocationRegistryDefinitionId, LEGACY_REV_REG_DEF_IDENTIFIER);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_legacy_rev_reg_def_id() {
        assert!(RevocationRegistryDefinitionId::new(
            "V4SGRU86Z58d6TV7PBUe6f:4:V4SGRU86Z58d6TV7PBUe6f:3:CL:12:tag1:CL_ACCUM:0"
        )
        .is_ok());
    }

    #[test]
    fn rejects_cred_def_id() {
        assert!(RevocationRegistryDefinitionId::new("V4SGRU86Z58d6TV7PBUe6f:3:CL:12:tag1").is_err());
    }
}
