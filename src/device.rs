//! The `Device` entity and the device-database collaborator (spec §3.1, §6.2).
//!
//! The real device database lives outside this crate's scope (spec §1); it is
//! represented here as a trait so the core can be driven in tests without a
//! persistence layer, the same way the teacher keeps discovery's participant
//! database behind a narrow interface rather than owning storage directly.

use std::collections::HashMap;

use enumflags2::{bitflags, BitFlags};

/// Bluetooth device address. Treated as an opaque 48-bit value everywhere in
/// the core; only the controller-facing edge needs its structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BdAddr(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Unknown,
    Earbud,
    Handset,
    SelfDevice,
    Sink,
}

#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFlag {
    PrimaryAddr = 1 << 0,
    SecondaryAddr = 1 << 1,
    MirroringMe = 1 << 2,
    MirroringCentralRole = 1 << 3,
    JustPaired = 1 << 4,
    LinkKeyTxRequired = 1 << 5,
    QhsConnected = 1 << 6,
    FirstConnectAfterDfu = 1 << 7,
    SwbNotSupported = 1 << 8,
    UpgradeTransportConnected = 1 << 9,
}

pub type DeviceFlagSet = BitFlags<DeviceFlag>;

#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Hfp = 1 << 0,
    A2dp = 1 << 1,
    Avrcp = 1 << 2,
    PeerSignalling = 1 << 3,
    Handover = 1 << 4,
    Mirror = 1 << 5,
    Gaia = 1 << 6,
    DfuPeer = 1 << 7,
    Accessory = 1 << 8,
    Peer = 1 << 9,
}

pub type ProfileSet = BitFlags<Profile>;

/// Minimum peer-profile mask kept while in-case (spec §4.2.9).
pub fn minimum_peer_profile_mask() -> ProfileSet {
    Profile::PeerSignalling.into()
}

/// Full peer-profile mask requested out-of-case (spec §4.2.9).
pub fn full_peer_profile_mask() -> ProfileSet {
    Profile::PeerSignalling | Profile::Handover | Profile::Mirror
}

/// Per-profile configuration carried on a `Device` (spec §3.1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileConfig {
    pub hfp_volume: Option<u8>,
    pub a2dp_volume: Option<u8>,
    pub va_flags: u16,
    pub va_locale: Option<[u8; 5]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub addr: BdAddr,
    pub device_type: DeviceType,
    pub flags: DeviceFlagSet,
    pub supported_profiles: ProfileSet,
    pub connected_profiles: ProfileSet,
    pub profile_config: ProfileConfig,
}

impl Device {
    pub fn new(addr: BdAddr, device_type: DeviceType) -> Self {
        Self {
            addr,
            device_type,
            flags: DeviceFlagSet::default(),
            supported_profiles: ProfileSet::default(),
            connected_profiles: ProfileSet::default(),
            profile_config: ProfileConfig::default(),
        }
    }

    pub fn has_flag(&self, flag: DeviceFlag) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_connected(&self, profile: Profile) -> bool {
        self.connected_profiles.contains(profile)
    }
}

/// Out-of-scope collaborator (spec §1, §6.2): owns device persistence.
/// The core only ever reads/writes through this interface, and never owns a
/// `Device` directly - mirror/topology state holds a `BdAddr` and re-resolves
/// through this trait on use (spec §9's "back-references by identifier" note).
pub trait DeviceDatabase {
    fn get(&self, addr: BdAddr) -> Option<&Device>;
    fn get_mut(&mut self, addr: BdAddr) -> Option<&mut Device>;
    fn create(&mut self, addr: BdAddr, device_type: DeviceType) -> &mut Device;
    fn delete(&mut self, addr: BdAddr);
    fn clear_all_of_type(&mut self, device_type: DeviceType);
    /// Deferred persistence to non-volatile storage (spec §5's
    /// "store-with-delay" contract); a no-op for the in-memory database.
    fn store_with_delay(&mut self, addr: BdAddr);
}

#[derive(Debug, Default)]
pub struct InMemoryDeviceDatabase {
    devices: HashMap<BdAddr, Device>,
}

impl DeviceDatabase for InMemoryDeviceDatabase {
    fn get(&self, addr: BdAddr) -> Option<&Device> {
        self.devices.get(&addr)
    }

    fn get_mut(&mut self, addr: BdAddr) -> Option<&mut Device> {
        self.devices.get_mut(&addr)
    }

    fn create(&mut self, addr: BdAddr, device_type: DeviceType) -> &mut Device {
        self.devices.entry(addr).or_insert_with(|| Device::new(addr, device_type))
    }

    fn delete(&mut self, addr: BdAddr) {
        self.devices.remove(&addr);
    }

    fn clear_all_of_type(&mut self, device_type: DeviceType) {
        self.devices.retain(|_, d| d.device_type != device_type);
    }

    fn store_with_delay(&mut self, _addr: BdAddr) {}
}
