/*!
 * Cellular modem proxy.
 */
use std::sync::Arc;

use crate::hardware::{invalid, CellRecord, CellularHardware, FunctionClass, FunctionHandle};
use crate::proxy::{proxy_enum, FunctionProxy, OnOff, ProxyBase, Result};

proxy_enum! {
    /// Radio technology of the current cell
    pub enum CellType {
        Gprs = 0 => "GPRS",
        Egprs = 1 => "EGPRS",
        Wcdma = 2 => "WCDMA",
        Hsdpa = 3 => "HSDPA",
        None = 4 => "NONE",
        Cdma = 5 => "CDMA",
        LteM = 6 => "LTE_M",
        NbIot = 7 => "NB_IOT",
        EcGsmIot = 8 => "EC_GSM_IOT",
    }
}

proxy_enum! {
    /// Networks on which data may be used
    pub enum EnableData {
        HomeNetwork = 0 => "HOMENETWORK",
        Roaming = 1 => "ROAMING",
        Never = 2 => "NEVER",
        Neutrality = 3 => "NEUTRALITY",
    }
}

/// Cached modem properties
#[derive(Debug, Clone)]
pub struct CellularCache {
    link_quality: i32,
    cell_operator: String,
    airplane_mode: OnOff,
    enable_data: EnableData,
    apn: String,
    ping_interval: i32,
    radio_config: String,
    locked_operator: String,
}

impl Default for CellularCache {
    fn default() -> Self {
        Self {
            link_quality: invalid::INT,
            cell_operator: invalid::STRING.to_string(),
            airplane_mode: OnOff::Invalid,
            enable_data: EnableData::Invalid,
            apn: invalid::STRING.to_string(),
            ping_interval: invalid::INT,
            radio_config: invalid::STRING.to_string(),
            locked_operator: invalid::STRING.to_string(),
        }
    }
}

/// Proxy of a cellular modem
#[derive(Debug)]
pub struct CellularProxy {
    base: ProxyBase<dyn CellularHardware, CellularCache>,
}

impl FunctionProxy for CellularProxy {
    const CLASS: FunctionClass = FunctionClass::Cellular;
    type Hardware = dyn CellularHardware;
    type Cache = CellularCache;

    fn new(base: ProxyBase<dyn CellularHardware, CellularCache>) -> Self {
        Self { base }
    }

    fn base(&self) -> &ProxyBase<dyn CellularHardware, CellularCache> {
        &self.base
    }

    fn select(handle: &FunctionHandle) -> Option<Arc<dyn CellularHardware>> {
        match handle {
            FunctionHandle::Cellular(hw) => Some(hw.clone()),
            _ => None,
        }
    }

    fn refresh_config(&self) {
        let b = &self.base;
        b.refresh("airplane_mode", |c| &mut c.airplane_mode, |hw| hw.get_airplane_mode().map(OnOff::from_library));
        b.refresh("enable_data", |c| &mut c.enable_data, |hw| hw.get_enable_data().map(EnableData::from_library));
        b.refresh("apn", |c| &mut c.apn, |hw| hw.get_apn());
        b.refresh("ping_interval", |c| &mut c.ping_interval, |hw| hw.get_ping_interval());
        b.refresh("radio_config", |c| &mut c.radio_config, |hw| hw.get_radio_config());
        b.refresh("locked_operator", |c| &mut c.locked_operator, |hw| hw.get_locked_operator());
    }

    fn refresh_cache(&self) {
        let b = &self.base;
        b.refresh("link_quality", |c| &mut c.link_quality, |hw| hw.get_link_quality());
        b.refresh("cell_operator", |c| &mut c.cell_operator, |hw| hw.get_cell_operator());
    }

    fn parse_advertised(&self, value: &str) {
        if let Ok(quality) = value.trim().parse::<i32>() {
            self.base.store("link_quality", |c| &mut c.link_quality, quality);
        }
    }
}

impl CellularProxy {
    /// Read the link quality, in percent
    pub fn get_link_quality(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_link_quality())
    }

    /// Cached link quality
    pub fn link_quality(&self) -> i32 {
        self.base.cached(|c| &c.link_quality)
    }

    /// Read the cell operator
    pub fn get_cell_operator(&self) -> Result<String> {
        self.base.read(|hw| hw.get_cell_operator())
    }

    /// Operator as of the last arrival
    pub fn cell_operator(&self) -> String {
        self.base.cached(|c| &c.cell_operator)
    }

    /// Read the cell identifier
    pub fn get_cell_identifier(&self) -> Result<String> {
        self.base.read(|hw| hw.get_cell_identifier())
    }

    /// Read the cell type
    pub fn get_cell_type(&self) -> Result<CellType> {
        self.base.read(|hw| hw.get_cell_type().map(CellType::from_library))
    }

    /// Read the subscriber identity of the SIM card
    pub fn get_imsi(&self) -> Result<String> {
        self.base.read(|hw| hw.get_imsi())
    }

    /// Read the latest status message of the modem
    pub fn get_message(&self) -> Result<String> {
        self.base.read(|hw| hw.get_message())
    }

    /// Read the SIM PIN
    pub fn get_pin(&self) -> Result<String> {
        self.base.read(|hw| hw.get_pin())
    }

    /// Change the SIM PIN
    pub fn set_pin(&self, value: &str) -> Result<()> {
        self.base.write(value.to_string(), |hw, v| hw.set_pin(&v))
    }

    /// Read the radio technology selection
    pub fn get_radio_config(&self) -> Result<String> {
        self.base.read(|hw| hw.get_radio_config())
    }

    /// Change the radio technology selection
    pub fn set_radio_config(&self, value: &str) -> Result<()> {
        self.base.write(value.to_string(), |hw, v| hw.set_radio_config(&v))
    }

    /// Cached radio technology selection
    pub fn radio_config(&self) -> String {
        self.base.cached(|c| &c.radio_config)
    }

    /// Like `set_radio_config`, skipped when the value matches the cache
    pub fn apply_radio_config(&self, value: &str) -> Result<()> {
        self.base.apply("radio_config", |c| &mut c.radio_config, value.to_string(), |hw, v| {
            hw.set_radio_config(&v)
        })
    }

    /// Read the locked operator
    pub fn get_locked_operator(&self) -> Result<String> {
        self.base.read(|hw| hw.get_locked_operator())
    }

    /// Change the locked operator
    pub fn set_locked_operator(&self, value: &str) -> Result<()> {
        self.base.write(value.to_string(), |hw, v| hw.set_locked_operator(&v))
    }

    /// Cached locked operator
    pub fn locked_operator(&self) -> String {
        self.base.cached(|c| &c.locked_operator)
    }

    /// Like `set_locked_operator`, skipped when the value matches the cache
    pub fn apply_locked_operator(&self, value: &str) -> Result<()> {
        self.base.apply("locked_operator", |c| &mut c.locked_operator, value.to_string(), |hw, v| {
            hw.set_locked_operator(&v)
        })
    }

    /// Read the airplane mode
    pub fn get_airplane_mode(&self) -> Result<OnOff> {
        self.base.read(|hw| hw.get_airplane_mode().map(OnOff::from_library))
    }

    /// Change the airplane mode
    pub fn set_airplane_mode(&self, value: OnOff) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_airplane_mode(v.to_library()))
    }

    /// Cached airplane mode
    pub fn airplane_mode(&self) -> OnOff {
        self.base.cached(|c| &c.airplane_mode)
    }

    /// Like `set_airplane_mode`, skipped when the value matches the cache
    pub fn apply_airplane_mode(&self, value: OnOff) -> Result<()> {
        self.base.apply("airplane_mode", |c| &mut c.airplane_mode, value, |hw, v| {
            hw.set_airplane_mode(v.to_library())
        })
    }

    /// Read the data service policy
    pub fn get_enable_data(&self) -> Result<EnableData> {
        self.base.read(|hw| hw.get_enable_data().map(EnableData::from_library))
    }

    /// Change the data service policy
    pub fn set_enable_data(&self, value: EnableData) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_enable_data(v.to_library()))
    }

    /// Cached data service policy
    pub fn enable_data(&self) -> EnableData {
        self.base.cached(|c| &c.enable_data)
    }

    /// Like `set_enable_data`, skipped when the value matches the cache
    pub fn apply_enable_data(&self, value: EnableData) -> Result<()> {
        self.base.apply("enable_data", |c| &mut c.enable_data, value, |hw, v| hw.set_enable_data(v.to_library()))
    }

    /// Read the access point name
    pub fn get_apn(&self) -> Result<String> {
        self.base.read(|hw| hw.get_apn())
    }

    /// Change the access point name
    pub fn set_apn(&self, value: &str) -> Result<()> {
        self.base.write(value.to_string(), |hw, v| hw.set_apn(&v))
    }

    /// Cached access point name
    pub fn apn(&self) -> String {
        self.base.cached(|c| &c.apn)
    }

    /// Like `set_apn`, skipped when the value matches the cache
    pub fn apply_apn(&self, value: &str) -> Result<()> {
        self.base.apply("apn", |c| &mut c.apn, value.to_string(), |hw, v| hw.set_apn(&v))
    }

    /// Read the keep-alive ping interval, in seconds
    pub fn get_ping_interval(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_ping_interval())
    }

    /// Change the keep-alive ping interval
    pub fn set_ping_interval(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_ping_interval(v))
    }

    /// Cached keep-alive ping interval
    pub fn ping_interval(&self) -> i32 {
        self.base.cached(|c| &c.ping_interval)
    }

    /// Like `set_ping_interval`, skipped when the value matches the cache
    pub fn apply_ping_interval(&self, value: i32) -> Result<()> {
        self.base.apply("ping_interval", |c| &mut c.ping_interval, value, |hw, v| hw.set_ping_interval(v))
    }

    /// Read the count of bytes sent
    pub fn get_data_sent(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_data_sent())
    }

    /// Change the count of bytes sent
    pub fn set_data_sent(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_data_sent(v))
    }

    /// Read the count of bytes received
    pub fn get_data_received(&self) -> Result<i32> {
        self.base.read(|hw| hw.get_data_received())
    }

    /// Change the count of bytes received
    pub fn set_data_received(&self, value: i32) -> Result<()> {
        self.base.write(value, |hw, v| hw.set_data_received(v))
    }

    /// Unlock the SIM card with its PUK and choose a new PIN
    pub fn send_puk(&self, puk: &str, new_pin: &str) -> Result<()> {
        self.base.read(|hw| hw.send_puk(puk, new_pin))
    }

    /// Set the credentials used to reach the access point
    pub fn set_apn_auth(&self, username: &str, password: &str) -> Result<()> {
        self.base.read(|hw| hw.set_apn_auth(username, password))
    }

    /// Reset the sent and received byte counters
    pub fn clear_data_counters(&self) -> Result<()> {
        self.base.read(|hw| hw.clear_data_counters())
    }

    /// Send a raw AT command to the modem
    pub fn at_command(&self, cmd: &str) -> Result<String> {
        self.base.read(|hw| hw.at_command(cmd))
    }

    /// List the cells seen around, serving cell first
    pub fn quick_cell_survey(&self) -> Result<Vec<CellRecord>> {
        self.base.read(|hw| hw.quick_cell_survey())
    }

    /// List the operators currently in range
    pub fn available_operators(&self) -> Result<Vec<String>> {
        self.base.read(|hw| hw.available_operators())
    }

    /// Operator name of a `MCCMNC` code
    pub fn decode_plmn(&self, mccmnc: &str) -> Result<String> {
        self.base.read(|hw| hw.decode_plmn(mccmnc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ProxyManager;
    use crate::sim::{SimModule, SimulatedLibrary};

    fn setup() -> (Arc<SimulatedLibrary>, Arc<CellularProxy>) {
        let library = Arc::new(SimulatedLibrary::new());
        library.plug(SimModule::new("YHUBGSM5-00001").with_function(FunctionClass::Cellular, "cellular"));
        let manager = ProxyManager::new(library.clone());
        let proxy = CellularProxy::find(&manager, "cellular");
        (library, proxy)
    }

    #[test]
    fn test_arrival_cache() {
        let (_library, proxy) = setup();
        assert_eq!(proxy.link_quality(), 72);
        assert_eq!(proxy.cell_operator(), "Swisscom");
        assert_eq!(proxy.airplane_mode(), OnOff::Off);
        assert_eq!(proxy.enable_data(), EnableData::HomeNetwork);
        assert_eq!(proxy.apn(), "gprs.swisscom.ch");
        assert_eq!(proxy.get_cell_type().unwrap(), CellType::LteM);
    }

    #[test]
    fn test_link_quality_pushed() {
        let (library, proxy) = setup();
        let hw = library.function("YHUBGSM5-00001.cellular").unwrap();
        hw.push_value("35");
        assert_eq!(proxy.link_quality(), 35);
    }

    #[test]
    fn test_remote_config_change_reloads() {
        let (library, proxy) = setup();
        let hw = library.function("YHUBGSM5-00001.cellular").unwrap();
        hw.set_config_attr("apn", "internet");
        assert_eq!(proxy.apn(), "internet");
    }

    #[test]
    fn test_modem_commands() {
        let (library, proxy) = setup();
        assert_eq!(proxy.at_command("+CSQ").unwrap(), "OK");
        proxy.send_puk("12345678", "0000").unwrap();
        assert_eq!(proxy.get_pin().unwrap(), "0000");
        assert_eq!(proxy.decode_plmn("22801").unwrap(), "Swisscom");

        let survey = proxy.quick_cell_survey().unwrap();
        assert_eq!(survey.len(), 1);
        assert_eq!(survey[0].mcc, 228);

        let hw = library.function("YHUBGSM5-00001.cellular").unwrap();
        assert_eq!(hw.journal()[0], "at_command(+CSQ)");
    }
}
