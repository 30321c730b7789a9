use dataset_cache::DatasetName;

/// Deterministic file names under the cache root, derived from the
/// normalised dataset key. Temporaries live in the same directory as the
/// finals so the replacing rename stays on one filesystem.
pub fn data_file_name(name: &DatasetName) -> String {
    format!("{}.parquet", name.key())
}

pub fn metadata_file_name(name: &DatasetName) -> String {
    format!("{}_metadata.json", name.key())
}

pub fn temp_data_file_name(name: &DatasetName) -> String {
    format!(".tmp_{}.parquet", name.key())
}

pub fn temp_metadata_file_name(name: &DatasetName) -> String {
    format!(".tmp_{}_metadata.json", name.key())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_derive_from_normalised_key() {
        let name = DatasetName::new("INFO MARCA-PROPIA PERU");
        assert_eq!(data_file_name(&name), "info_marca_propia_peru.parquet");
        assert_eq!(
            metadata_file_name(&name),
            "info_marca_propia_peru_metadata.json"
        );
    }

    #[test]
    fn temp_names_are_hidden_siblings() {
        let name = DatasetName::new("alpha");
        assert_eq!(temp_data_file_name(&name), ".tmp_alpha.parquet");
        assert_eq!(temp_metadata_file_name(&name), ".tmp_alpha_metadata.json");
    }
}
