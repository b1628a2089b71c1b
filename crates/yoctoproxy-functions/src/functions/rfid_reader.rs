/*!
 * RFID reader proxy.
 *
 * Tag operations are forwarded as is; the reader advertises the number of
 * tags in its field.
 */
use std::sync::Arc;

use bytes::Bytes;

use crate::hardware::{invalid, FunctionClass, FunctionHandle, RfidOptions, RfidReaderHardware, RfidTagInfo};
use crate::proxy::{FunctionProxy, ProxyBase, Result};

/// Cached reader properties
#[derive(Debug, Clone)]
pub struct RfidReaderCache {
    n_tags: i32,
    refresh_rate: i32,
}

impl Default for RfidReaderCache {
    fn default() -> Self {
        Self {
            n_tags: invalid::INT,
            refresh_rate: invalid::INT,
        }
    }
}

/// Proxy of an RFID reader
#[derive(Debug)]
pub struct RfidReaderProxy {
    base: ProxyBase<dyn RfidReaderHardware, RfidReaderCache>,
}

impl FunctionProxy for RfidReaderProxy {
    const CLASS: FunctionClass = FunctionClass::RfidReader;
    type Hardware = dyn RfidReaderHardware;
    type Cache = RfidReaderCache;

    fn new(base: ProxyBase<dyn RfidReaderHardware, RfidReaderCache>) -> Self {
        Self { base }
    }

    fn base(&self) -> &ProxyBase<dyn RfidReaderHardware, RfidReaderCache> {
        &self.base
    }

    fn select(handle: &FunctionHandle) -> Option<Arc<dyn RfidReaderHardware>> {
        match handle {
            FunctionHandle::RfidReader(hw) => Some(hw.clone()),
            _ => None,
        }
    }

    fn refresh_config(&self) {
        self.base.refresh("refresh_rate", |c| &mut c.refresh_rate, |hw| hw.get_refresh_rate());
    }

    fn refresh_cache(&self) {
        self.base.refresh("n_tags", |c| &mut c.n_tags, |hw| hw.get_n_tags());
    }

    fn parse_advertised(&self, value: &str) {
        if let Ok(count) = value.trim().parse::<i32>() {
            self.base.store("n_tags", |c| &mut c.n_tags, count);
        }
    }
}

impl RfidReaderProxy {
    /// Read the number of tags in the field
    pub fn get_n_tags(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_n_tags())
    }

    /// Cached number of tags in the field
    pub fn n_tags(&self) -> i32 {
        self.base.cached(|c| &c.n_tags)
    }

    /// Read the field scan rate, in Hz
    pub fn get_refresh_rate(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_refresh_rate())
    }

    /// Change the field scan rate
    pub fn set_refresh_rate(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_refresh_rate(v))
    }

    /// Cached field scan rate
    pub fn refresh_rate(&self) -> i32 {
        self.base.cached(|c| &c.refresh_rate)
    }

    /// Like `set_refresh_rate`, skipped when the value matches the cache
    pub fn apply_refresh_rate(&self, value: i32) -> Result<()> {
        self.base.apply("refresh_rate", |c| &mut c.refresh_rate, value, |hw, v| hw.set_refresh_rate(v))
    }

    /// Identifiers of the tags in the field
    pub fn tag_id_list(&self) -> Result<Vec<String>> {
        self.base.read(|hw| hw.tag_id_list())
    }

    /// Describe a tag in the field
    pub fn tag_info(&self, tag_id: &str) -> Result<RfidTagInfo> {
        self.base.read(|hw| hw.tag_info(tag_id))
    }

    /// Make blocks read-only. Irreversible on real tags.
    pub fn tag_lock_blocks(&self, tag_id: &str, first_block: i32, n_blocks: i32, options: &RfidOptions) -> Result<()> {
        self.base.read(|hw| hw.tag_lock_blocks(tag_id, first_block, n_blocks, options))
    }

    /// Lock state of each block in a range
    pub fn tag_get_locks(&self, tag_id: &str, first_block: i32, n_blocks: i32, options: &RfidOptions) -> Result<Vec<bool>> {
        self.base.read(|hw| hw.tag_get_locks(tag_id, first_block, n_blocks, options))
    }

    /// Read raw bytes from tag memory
    pub fn tag_read_bin(&self, tag_id: &str, first_block: i32, n_bytes: i32, options: &RfidOptions) -> Result<Bytes> {
        self.base.read(|hw| hw.tag_read_bin(tag_id, first_block, n_bytes, options))
    }

    /// Write raw bytes to tag memory
    pub fn tag_write_bin(&self, tag_id: &str, first_block: i32, data: &[u8], options: &RfidOptions) -> Result<()> {
        self.base.read(|hw| hw.tag_write_bin(tag_id, first_block, data, options))
    }

    /// Read tag memory as an hexadecimal string
    pub fn tag_read_hex(&self, tag_id: &str, first_block: i32, n_bytes: i32, options: &RfidOptions) -> Result<String> {
        self.base.read(|hw| hw.tag_read_hex(tag_id, first_block, n_bytes, options))
    }

    /// Write an hexadecimal string to tag memory
    pub fn tag_write_hex(&self, tag_id: &str, first_block: i32, hex: &str, options: &RfidOptions) -> Result<()> {
        self.base.read(|hw| hw.tag_write_hex(tag_id, first_block, hex, options))
    }

    /// Read tag memory as text
    pub fn tag_read_str(&self, tag_id: &str, first_block: i32, n_chars: i32, options: &RfidOptions) -> Result<String> {
        self.base.read(|hw| hw.tag_read_str(tag_id, first_block, n_chars, options))
    }

    /// Write text to tag memory
    pub fn tag_write_str(&self, tag_id: &str, first_block: i32, text: &str, options: &RfidOptions) -> Result<()> {
        self.base.read(|hw| hw.tag_write_str(tag_id, first_block, text, options))
    }

    /// Read the application family identifier of an ISO 15693 tag
    pub fn tag_get_afi(&self, tag_id: &str, options: &RfidOptions) -> Result<i32> {
        self.base.read(|hw| hw.tag_get_afi(tag_id, options))
    }

    /// Change the application family identifier of a tag
    pub fn tag_set_afi(&self, tag_id: &str, afi: i32, options: &RfidOptions) -> Result<()> {
        self.base.read(|hw| hw.tag_set_afi(tag_id, afi, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ProxyManager;
    use crate::sim::{SimModule, SimulatedLibrary};

    const TAG: &str = "E00401500A1B2C3D";

    fn setup() -> (Arc<SimulatedLibrary>, Arc<RfidReaderProxy>) {
        let library = Arc::new(SimulatedLibrary::new());
        library.plug(SimModule::new("YRFID01-00001").with_function(FunctionClass::RfidReader, "rfidReader"));
        let manager = ProxyManager::new(library.clone());
        let proxy = RfidReaderProxy::find(&manager, "rfidReader");
        (library, proxy)
    }

    #[test]
    fn test_tag_count_follows_field() {
        let (library, proxy) = setup();
        assert_eq!(proxy.n_tags(), 0);
        assert_eq!(proxy.refresh_rate(), 5);

        let hw = library.function("YRFID01-00001.rfidReader").unwrap();
        hw.insert_tag(TAG, 128);
        assert_eq!(proxy.n_tags(), 1);
        assert_eq!(proxy.tag_id_list().unwrap(), vec![TAG.to_string()]);

        hw.remove_tag(TAG);
        assert_eq!(proxy.n_tags(), 0);
    }

    #[test]
    fn test_tag_memory_access() {
        let (library, proxy) = setup();
        let hw = library.function("YRFID01-00001.rfidReader").unwrap();
        hw.insert_tag(TAG, 64);
        let options = RfidOptions::default();

        proxy.tag_write_bin(TAG, 0, &[0xDE, 0xAD, 0xBE, 0xEF], &options).unwrap();
        assert_eq!(proxy.tag_read_hex(TAG, 0, 4, &options).unwrap(), "DEADBEEF");
        assert_eq!(
            proxy.tag_read_bin(TAG, 0, 2, &options).unwrap(),
            Bytes::from_static(&[0xDE, 0xAD])
        );

        let info = proxy.tag_info(TAG).unwrap();
        assert_eq!(info.memory_size, 64);
        assert_eq!(info.last_block, 3);
    }

    #[test]
    fn test_dry_run_and_locks() {
        let (library, proxy) = setup();
        let hw = library.function("YRFID01-00001.rfidReader").unwrap();
        hw.insert_tag(TAG, 64);

        let dry = RfidOptions {
            enable_dry_run: true,
            ..RfidOptions::default()
        };
        proxy.tag_write_str(TAG, 0, "ignored", &dry).unwrap();
        assert_eq!(proxy.tag_read_str(TAG, 0, 7, &RfidOptions::default()).unwrap(), "");

        proxy.tag_lock_blocks(TAG, 2, 1, &RfidOptions::default()).unwrap();
        assert_eq!(
            proxy.tag_get_locks(TAG, 0, 4, &RfidOptions::default()).unwrap(),
            vec![false, false, true, false]
        );
        assert!(proxy.tag_write_hex(TAG, 2, "00", &RfidOptions::default()).is_err());
    }

    #[test]
    fn test_missing_tag() {
        let (_library, proxy) = setup();
        let err = proxy.tag_get_afi("nope", &RfidOptions::default()).unwrap_err();
        assert!(err.to_string().contains("not in field"));
    }
}
