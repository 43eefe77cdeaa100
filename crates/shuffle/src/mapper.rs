//! The write-path partition mapper: given a produced document, picks an
//! existing physical partition or creates one, then hands back the
//! journal name and content-type a publisher should append to.

use crate::key::{self, PartitionCandidate as _};
use crate::listing::{Listing, PartitionCandidate};
use gazette::journal::Client;
use labels::partition;
use proto_flow::flow::CollectionSpec;
use proto_gazette::broker;

/// The 36-byte sentinel a collection's ack template carries at its UUID
/// location, overwritten in place with a real v1 UUID before appending.
pub const UUID_PLACEHOLDER: &str = "DocUUIDPlaceholder-329Bb50aa48EAa9ef";

/// Maps produced documents of one collection to physical partitions,
/// creating them on demand.
pub struct Mapper {
    client: Client,
    collection: CollectionSpec,
    key_extractors: Vec<doc::Extractor>,
    partition_fields: Vec<String>,
    partition_extractors: Vec<doc::Extractor>,
}

impl Mapper {
    pub fn new(client: Client, collection: CollectionSpec) -> Self {
        let key_extractors = collection.key_ptrs.iter().map(|p| doc::Extractor::new(p)).collect();

        let mut partition_fields: Vec<String> = collection.partition_fields.clone();
        partition_fields.sort();

        let partition_extractors = partition_fields
            .iter()
            .map(|field| {
                let ptr = collection
                    .projections
                    .iter()
                    .find(|p| &p.field == field)
                    .map(|p| p.ptr.as_str())
                    .unwrap_or_default();
                doc::Extractor::new(ptr)
            })
            .collect();

        Self {
            client,
            collection,
            key_extractors,
            partition_fields,
            partition_extractors,
        }
    }

    /// Route `doc` to a physical journal, creating one if none yet covers
    /// its packed key hash, and return `(journal_name, content_type)`.
    pub async fn map(&self, listing: &mut Listing, doc: &serde_json::Value) -> crate::Result<(String, &'static str)> {
        let packed_key = doc::Extractor::extract_all(&self.key_extractors, doc);
        let hash = key::packed_key_hash(&packed_key);
        let hex_key = key::to_hex32(hash);
        let logical_prefix = self.logical_prefix(doc)?;

        loop {
            let candidates: Vec<PartitionCandidate<'_>> = listing.under_prefix(&logical_prefix).map(PartitionCandidate).collect();

            if let Some(idx) = key::pick_partition(&logical_prefix, &hex_key, &candidates) {
                let name = candidates[idx].name().to_string();
                return Ok((name, labels::CONTENT_TYPE_JSON_LINES));
            }

            self.create_partition(doc).await?;
            *listing = self.relist().await?;
        }
    }

    fn logical_prefix(&self, doc: &serde_json::Value) -> crate::Result<String> {
        let template = self
            .collection
            .partition_template
            .as_ref()
            .ok_or_else(|| crate::Error::Extraction("collection has no partition template".to_string()))?;

        let mut prefix = template.name.clone();
        prefix.push('/');
        for (field, extractor) in self.partition_fields.iter().zip(&self.partition_extractors) {
            let value = partition::encode_field_value(String::new(), extractor.query_node(doc))?;
            prefix.push_str(field);
            prefix.push('=');
            prefix.push_str(&value);
            prefix.push('/');
        }
        Ok(prefix)
    }

    fn partition_label_set(&self, doc: &serde_json::Value) -> crate::Result<broker::LabelSet> {
        let template = self.collection.partition_template.as_ref().unwrap();
        let mut set = template.labels.clone().unwrap_or_default();
        set = labels::set_value(set, labels::KEY_BEGIN, labels::KEY_BEGIN_MIN);
        set = labels::set_value(set, labels::KEY_END, labels::KEY_END_MAX);

        for (field, extractor) in self.partition_fields.iter().zip(&self.partition_extractors) {
            let value = partition::encode_field_value(String::new(), extractor.query_node(doc))?;
            set = labels::add_value(set, &format!("{}{field}", labels::FIELD_PREFIX), &value);
        }
        Ok(set)
    }

    async fn create_partition(&self, doc: &serde_json::Value) -> crate::Result<()> {
        let template = self.collection.partition_template.as_ref().unwrap();
        let set = self.partition_label_set(doc)?;
        let name = format!("{}/{}", template.name, partition::name_suffix(&set)?);

        let spec = broker::JournalSpec {
            name: name.clone(),
            replication: template.replication,
            labels: Some(set),
            fragment: template.fragment.clone(),
            flags: template.flags,
            max_append_rate: template.max_append_rate,
        };

        let outcome = self
            .client
            .apply(broker::ApplyRequest {
                changes: vec![broker::ApplyRequestChange { expect_mod_revision: 0, upsert: Some(spec), delete: String::new() }],
            })
            .await;

        match outcome {
            Ok(_) => {
                crate::PARTITIONS_CREATED.with_label_values(&[&self.collection.name]).inc();
                Ok(())
            }
            // Someone else raced us to create this partition; the next
            // listing refresh will observe the winner.
            Err(gazette::Error::BrokerStatus(broker::Status::EtcdTransactionFailed)) => Ok(()),
            Err(gazette::Error::BrokerStatus(status)) => Err(crate::Error::CreatePartition { name, status }),
            Err(err) => Err(err.into()),
        }
    }

    async fn relist(&self) -> crate::Result<Listing> {
        let selector = broker::LabelSelector {
            include: Some(labels::build_set([(labels::COLLECTION, self.collection.name.as_str())])),
            exclude: None,
        };
        let resp = self.client.list(broker::ListRequest { selector: Some(selector), watch: false, watch_resume: None }).await?;
        Ok(Listing::new(resp.journals))
    }
}

/// Clone a collection's acknowledgement template and stamp it with a
/// fresh RFC 4122 v1 UUID at its placeholder location.
pub fn new_acknowledgement_message(collection: &CollectionSpec) -> Vec<u8> {
    let mut bytes = collection.ack_template_json.to_vec();
    set_uuid(&mut bytes, new_message_uuid(crate::message::FLAG_ACK_TXN as u8));
    bytes
}

/// Overwrite the first occurrence of [`UUID_PLACEHOLDER`] in `doc_json`
/// with `uuid`'s canonical (hyphenated, lowercase) encoding, in place. The
/// replacement is exactly 36 bytes both ways, so no length change occurs.
pub fn set_uuid(doc_json: &mut [u8], uuid: uuid::Uuid) {
    let at = memchr::memmem::find(doc_json, UUID_PLACEHOLDER.as_bytes()).expect("ack template carries the UUID placeholder");
    let mut encoded = [0u8; 36];
    uuid.hyphenated().encode_lower(&mut encoded);
    doc_json[at..at + 36].copy_from_slice(&encoded);
}

/// Produce a fresh message UUID carrying `flags` in its low nibble, per
/// the encoding [`crate::message`] parses back out.
fn new_message_uuid(flags: u8) -> uuid::Uuid {
    let context = uuid::v1::Context::new(rand::random());
    let mut node_id: [u8; 6] = rand::random();
    node_id[5] = (node_id[5] & !(crate::message::FLAGS_MASK as u8)) | (flags & crate::message::FLAGS_MASK as u8);

    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    let ts = uuid::v1::Timestamp::from_unix(&context, now.as_secs(), now.subsec_nanos());
    uuid::Uuid::new_v1(ts, &node_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_placeholder_is_36_bytes() {
        assert_eq!(UUID_PLACEHOLDER.len(), 36);
    }

    #[test]
    fn test_set_uuid_overwrites_in_place() {
        let template = format!(r#"{{"_meta":{{"uuid":"{UUID_PLACEHOLDER}"}}}}"#);
        let mut bytes = template.into_bytes();
        let before_len = bytes.len();

        set_uuid(&mut bytes, new_message_uuid(0));

        assert_eq!(bytes.len(), before_len);
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let uuid_str = v["_meta"]["uuid"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(uuid_str).is_ok());
        assert_ne!(uuid_str, UUID_PLACEHOLDER);
    }
}
