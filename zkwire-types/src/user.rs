//! User records (28-byte and 72-byte layouts)

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};
use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::field::{clamp_u16, clamp_u32, read_ascii, write_ascii};

/// Size of the extended user layout
pub const USER72_SIZE: usize = 72;

/// Size of the compact user layout
pub const USER28_SIZE: usize = 28;

bitflags! {
    /// Permission token stored in byte 2 of every user record
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permission: u8 {
        /// Account disabled
        const DISABLED = 0x01;
        /// Role level bit 0
        const LEVEL_0 = 0x02;
        /// Role level bit 1
        const LEVEL_1 = 0x04;
        /// Role level bit 2
        const LEVEL_2 = 0x08;
    }
}

impl Permission {
    /// Compose a token from a role and the enabled flag
    pub fn from_role(role: Role, enabled: bool) -> Self {
        let level = role.level();
        let mut token = Self::empty();

        if level & 0x1 != 0 {
            token |= Self::LEVEL_0;
        }
        if level & 0x2 != 0 {
            token |= Self::LEVEL_1;
        }
        if level & 0x4 != 0 {
            token |= Self::LEVEL_2;
        }
        if !enabled {
            token |= Self::DISABLED;
        }

        token
    }

    /// Check if the account is enabled
    pub fn is_enabled(self) -> bool {
        !self.contains(Self::DISABLED)
    }

    /// Role level encoded in the token (0..=7)
    pub fn role_level(self) -> u8 {
        (self.bits() >> 1) & 0x07
    }
}

/// Named user roles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Role {
    #[default]
    User,
    Enroller,
    Admin,
    SuperAdmin,
    /// Raw role level
    Level(u8),
}

impl Role {
    /// Numeric role level
    pub fn level(self) -> u8 {
        match self {
            Self::User => 0,
            Self::Enroller => 1,
            Self::Admin => 3,
            Self::SuperAdmin => 7,
            Self::Level(level) => level,
        }
    }

    /// Resolve a role name; unknown names fall back to [`Role::User`]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "enroller" => Self::Enroller,
            "admin" => Self::Admin,
            "superadmin" => Self::SuperAdmin,
            _ => Self::User,
        }
    }
}

/// User record to be written with `CMD_USER_WRQ`
///
/// `uid` is required. Integer fields are clamped to their wire width when
/// encoded; strings are stripped to ASCII and truncated.
///
/// # Examples
///
/// ```
/// use zkwire_types::{Role, UserWrite};
///
/// let payload = UserWrite::new(42)
///     .with_user_id("USR42")
///     .with_name("Test User")
///     .with_role(Role::Admin)
///     .encode72()
///     .unwrap();
/// assert_eq!(payload.len(), 72);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserWrite {
    pub uid: Option<i64>,
    pub user_id: Option<String>,
    pub name: String,
    pub password: String,
    pub role: Role,
    /// `None` means enabled
    pub enabled: Option<bool>,
    /// Bypasses the role mapping when set
    pub permission_token: Option<u8>,
    pub card_number: Option<i64>,
    /// Defaults to group 1
    pub group_number: Option<i64>,
    /// Inferred from the timezone fields when unset
    pub timezone_flag: Option<i64>,
    pub use_group_timezones: Option<bool>,
    pub timezones: Vec<i64>,
}

impl UserWrite {
    pub fn new(uid: impl Into<i64>) -> Self {
        Self {
            uid: Some(uid.into()),
            ..Self::default()
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_permission_token(mut self, token: u8) -> Self {
        self.permission_token = Some(token);
        self
    }

    pub fn with_card_number(mut self, card_number: impl Into<i64>) -> Self {
        self.card_number = Some(card_number.into());
        self
    }

    pub fn with_group_number(mut self, group: impl Into<i64>) -> Self {
        self.group_number = Some(group.into());
        self
    }

    pub fn with_timezone_flag(mut self, flag: impl Into<i64>) -> Self {
        self.timezone_flag = Some(flag.into());
        self
    }

    pub fn with_group_timezones(mut self, use_group: bool) -> Self {
        self.use_group_timezones = Some(use_group);
        self
    }

    pub fn with_timezones(mut self, timezones: impl IntoIterator<Item = i64>) -> Self {
        self.timezones = timezones.into_iter().collect();
        self
    }

    fn require_uid(&self, codec: &str) -> Result<i64> {
        self.uid.ok_or_else(|| Error::required(codec, "uid"))
    }

    fn permission(&self) -> Permission {
        match self.permission_token {
            Some(token) => Permission::from_bits_retain(token),
            None => Permission::from_role(self.role, self.enabled != Some(false)),
        }
    }

    fn inferred_timezone_flag(&self) -> u16 {
        match self.timezone_flag {
            Some(flag) => clamp_u16(flag),
            None if self.use_group_timezones == Some(false) || !self.timezones.is_empty() => 1,
            None => 0,
        }
    }

    /// Encode the 72-byte layout
    pub fn encode72(&self) -> Result<Bytes> {
        let uid = self.require_uid("encode_user72")?;
        let mut buf = BytesMut::zeroed(USER72_SIZE);

        LittleEndian::write_u16(&mut buf[0..2], clamp_u16(uid));
        buf[2] = self.permission().bits();
        write_ascii(&mut buf, 3, 8, &self.password);
        write_ascii(&mut buf, 11, 24, &self.name);
        LittleEndian::write_u32(&mut buf[35..39], clamp_u32(self.card_number.unwrap_or(0)));
        buf[39] = clamp_u16(self.group_number.unwrap_or(1)) as u8;
        LittleEndian::write_u16(&mut buf[40..42], self.inferred_timezone_flag());

        for slot in 0..3 {
            let tz = self.timezones.get(slot).copied().unwrap_or(0);
            let offset = 42 + slot * 2;
            LittleEndian::write_u16(&mut buf[offset..offset + 2], clamp_u16(tz));
        }

        write_ascii(&mut buf, 48, 9, self.user_id.as_deref().unwrap_or(""));

        Ok(buf.freeze())
    }

    /// Encode the 28-byte layout
    ///
    /// The compact layout stores the user id as a number; non-numeric ids
    /// fall back to `uid`.
    pub fn encode28(&self) -> Result<Bytes> {
        let uid = self.require_uid("encode_user28")?;
        let mut buf = BytesMut::zeroed(USER28_SIZE);

        LittleEndian::write_u16(&mut buf[0..2], clamp_u16(uid));
        buf[2] = self.permission().bits();
        write_ascii(&mut buf, 3, 5, &self.password);
        write_ascii(&mut buf, 8, 8, &self.name);

        let user_id = self
            .user_id
            .as_deref()
            .and_then(|id| id.trim().parse::<i64>().ok())
            .unwrap_or(uid);
        LittleEndian::write_u32(&mut buf[24..28], clamp_u32(user_id));

        Ok(buf.freeze())
    }
}

/// User record as stored on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub uid: u16,
    pub permission: Permission,
    pub password: String,
    pub name: String,
    pub card_number: u32,
    pub group_number: u8,
    pub timezone_flag: u16,
    pub timezones: [u16; 3],
    pub user_id: String,
}

impl User {
    /// Decode the 72-byte layout
    pub fn decode72(buf: &[u8]) -> Result<Self> {
        Error::ensure_len("user72 record", buf, USER72_SIZE)?;

        Ok(Self {
            uid: LittleEndian::read_u16(&buf[0..2]),
            permission: Permission::from_bits_retain(buf[2]),
            password: read_ascii(buf, 3, 8),
            name: read_ascii(buf, 11, 24),
            card_number: LittleEndian::read_u32(&buf[35..39]),
            group_number: buf[39],
            timezone_flag: LittleEndian::read_u16(&buf[40..42]),
            timezones: [
                LittleEndian::read_u16(&buf[42..44]),
                LittleEndian::read_u16(&buf[44..46]),
                LittleEndian::read_u16(&buf[46..48]),
            ],
            user_id: read_ascii(buf, 48, 9),
        })
    }

    /// Decode the 28-byte layout
    pub fn decode28(buf: &[u8]) -> Result<Self> {
        Error::ensure_len("user28 record", buf, USER28_SIZE)?;

        Ok(Self {
            uid: LittleEndian::read_u16(&buf[0..2]),
            permission: Permission::from_bits_retain(buf[2]),
            password: read_ascii(buf, 3, 5),
            name: read_ascii(buf, 8, 8),
            card_number: 0,
            group_number: 0,
            timezone_flag: 0,
            timezones: [0; 3],
            user_id: LittleEndian::read_u32(&buf[24..28]).to_string(),
        })
    }
}

/// Validated user identifier for delete operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uid(u16);

impl Uid {
    pub fn get(self) -> u16 {
        self.0
    }

    /// Little-endian payload for `CMD_DELETE_USER`
    pub fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    fn invalid(value: impl fmt::Display) -> Error {
        Error::Validation(format!("uid must be a non-negative integer, got {value}"))
    }
}

impl TryFrom<i64> for Uid {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        if value < 0 {
            return Err(Self::invalid(value));
        }
        u16::try_from(value)
            .map(Self)
            .map_err(|_| Error::Validation(format!("uid {value} exceeds 65535")))
    }
}

impl TryFrom<i32> for Uid {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        Self::try_from(value as i64)
    }
}

impl TryFrom<u32> for Uid {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::try_from(value as i64)
    }
}

impl TryFrom<u16> for Uid {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        Ok(Self(value))
    }
}

impl TryFrom<&str> for Uid {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        value.parse()
    }
}

impl FromStr for Uid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parsed: i64 = s.trim().parse().map_err(|_| Self::invalid(format!("{s:?}")))?;
        Self::try_from(parsed)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> UserWrite {
        UserWrite::new(42)
            .with_user_id("USR42")
            .with_name("Test User")
            .with_password("1234")
            .with_role(Role::Admin)
            .with_enabled(false)
            .with_card_number(98765)
            .with_group_number(7)
            .with_timezones([2, 4, 6])
            .with_timezone_flag(9)
    }

    #[test]
    fn test_encode72_field_mapping() {
        let buf = sample().encode72().unwrap();

        assert_eq!(buf.len(), 72);
        assert_eq!(LittleEndian::read_u16(&buf[0..2]), 42);
        assert_eq!(buf[2], 0x07);
        assert_eq!(&buf[3..7], b"1234");
        assert_eq!(&buf[11..20], b"Test User");
        assert_eq!(LittleEndian::read_u32(&buf[35..39]), 98765);
        assert_eq!(buf[39], 7);
        assert_eq!(LittleEndian::read_u16(&buf[40..42]), 9);
        assert_eq!(LittleEndian::read_u16(&buf[42..44]), 2);
        assert_eq!(LittleEndian::read_u16(&buf[44..46]), 4);
        assert_eq!(LittleEndian::read_u16(&buf[46..48]), 6);
        assert_eq!(&buf[48..53], b"USR42");
        assert_eq!(buf[53], 0);
    }

    #[test]
    fn test_decode72_recovers_fields() {
        let user = User::decode72(&sample().encode72().unwrap()).unwrap();

        assert_eq!(user.uid, 42);
        assert_eq!(user.name, "Test User");
        assert_eq!(user.password, "1234");
        assert_eq!(user.card_number, 98765);
        assert_eq!(user.permission.bits(), 0x07);
        assert!(!user.permission.is_enabled());
        assert_eq!(user.permission.role_level(), 3);
        assert_eq!(user.group_number, 7);
        assert_eq!(user.timezones, [2, 4, 6]);
        assert_eq!(user.user_id, "USR42");
    }

    #[test]
    fn test_encode72_sanitizes_and_defaults() {
        let buf = UserWrite::new(1)
            .with_name("Ángela 😊")
            .with_user_id("ID1")
            .with_group_timezones(true)
            .with_timezones([5])
            .encode72()
            .unwrap();

        assert_eq!(LittleEndian::read_u16(&buf[0..2]), 1);
        assert_eq!(buf[2], 0x00);
        assert_eq!(read_ascii(&buf, 11, 24), "ngela ");
        assert_eq!(buf[39], 1);
        assert_eq!(LittleEndian::read_u16(&buf[40..42]), 1);
        assert_eq!(LittleEndian::read_u16(&buf[42..44]), 5);
        assert_eq!(LittleEndian::read_u16(&buf[44..46]), 0);
        assert_eq!(LittleEndian::read_u16(&buf[46..48]), 0);
    }

    #[test]
    fn test_truncation_to_field_width() {
        let user = User::decode72(
            &UserWrite::new(3)
                .with_name("A name that is far longer than twenty four bytes")
                .with_password("0123456789")
                .encode72()
                .unwrap(),
        )
        .unwrap();

        assert_eq!(user.name, "A name that is far longe");
        assert_eq!(user.password, "01234567");
    }

    #[test]
    fn test_role_mapping() {
        assert_eq!(Permission::from_role(Role::User, true).bits(), 0x00);
        assert_eq!(Permission::from_role(Role::Enroller, true).bits(), 0x02);
        assert_eq!(Permission::from_role(Role::Admin, true).bits(), 0x06);
        assert_eq!(Permission::from_role(Role::SuperAdmin, true).bits(), 0x0E);
        assert_eq!(Permission::from_role(Role::User, false).bits(), 0x01);
        assert_eq!(Role::from_name(" Admin "), Role::Admin);
        assert_eq!(Role::from_name("janitor"), Role::User);
    }

    #[test]
    fn test_explicit_permission_token_bypasses_role() {
        let buf = UserWrite::new(5)
            .with_role(Role::SuperAdmin)
            .with_enabled(false)
            .with_permission_token(0x40)
            .encode72()
            .unwrap();

        assert_eq!(buf[2], 0x40);
    }

    #[test]
    fn test_timezone_flag_inference() {
        let flag = |user: UserWrite| {
            let buf = user.encode72().unwrap();
            LittleEndian::read_u16(&buf[40..42])
        };

        assert_eq!(flag(UserWrite::new(1)), 0);
        assert_eq!(flag(UserWrite::new(1).with_group_timezones(true)), 0);
        assert_eq!(flag(UserWrite::new(1).with_group_timezones(false)), 1);
        assert_eq!(flag(UserWrite::new(1).with_timezones([3])), 1);
    }

    #[test]
    fn test_numeric_fields_clamp() {
        let user = User::decode72(
            &UserWrite::new(70_000)
                .with_card_number(-3)
                .with_timezones([100_000, -1])
                .encode72()
                .unwrap(),
        )
        .unwrap();

        assert_eq!(user.uid, 0xFFFF);
        assert_eq!(user.card_number, 0);
        assert_eq!(user.timezones, [0xFFFF, 0, 0]);
    }

    #[test]
    fn test_missing_uid_is_rejected() {
        let err = UserWrite::default().encode72().unwrap_err();
        assert_eq!(err, Error::Validation("encode_user72: uid is required".into()));

        assert!(matches!(
            UserWrite::default().encode28(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_encode28_layout() {
        let buf = UserWrite::new(12)
            .with_name("Short Name")
            .with_password("123456")
            .with_user_id("5001")
            .encode28()
            .unwrap();

        let user = User::decode28(&buf).unwrap();
        assert_eq!(user.uid, 12);
        assert_eq!(user.name, "Short Na");
        assert_eq!(user.password, "12345");
        assert_eq!(user.user_id, "5001");
    }

    #[test]
    fn test_encode28_non_numeric_user_id_falls_back_to_uid() {
        let buf = UserWrite::new(12).with_user_id("ABC").encode28().unwrap();
        assert_eq!(LittleEndian::read_u32(&buf[24..28]), 12);
    }

    #[test]
    fn test_decode_short_buffer() {
        assert!(matches!(User::decode72(&[0; 71]), Err(Error::Malformed { .. })));
        assert!(matches!(User::decode28(&[0; 10]), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_uid_validation() {
        assert_eq!(Uid::try_from(321i64).unwrap().get(), 321);
        assert_eq!("222".parse::<Uid>().unwrap().to_le_bytes(), [222, 0]);

        for err in [
            Uid::try_from(-1i64).unwrap_err(),
            Uid::try_from("NaN").unwrap_err(),
        ] {
            assert!(err.to_string().contains("uid must be a non-negative integer"));
        }

        assert!(matches!(Uid::try_from(70_000u32), Err(Error::Validation(_))));
    }
}
