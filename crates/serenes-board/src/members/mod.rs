use chrono::Utc;
use crate::models::{keys, Member, Profile, ProfileUpdate};
use crate::store::{RecordMap, Store, StoreResult};

/// Member records keyed by external identity.
#[derive(Clone)]
pub struct MemberRegistry {
    store: Store,
}

impl MemberRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn all(&self) -> RecordMap<Member> {
        self.store.load_record_map(keys::MEMBERS)
    }

    /// Replace the whole record for `member.external_id`.
    pub fn upsert_member(&self, member: Member) -> StoreResult<()> {
        let mut members = self.all();
        log::debug!("Upserting member {}", member.external_id);
        members.items.insert(member.external_id.clone(), member);
        self.store.save_record_map(keys::MEMBERS, &members)
    }

    pub fn get_member(&self, external_id: &str) -> Option<Member> {
        self.all().items.remove(external_id)
    }
}

/// Self-edited profile data keyed by external identity.
#[derive(Clone)]
pub struct ProfileStore {
    store: Store,
}

impl ProfileStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Merge `update` into the stored profile (or an empty one) and stamp
    /// `updated_at`. Fields left as `None` keep their stored value.
    pub fn save_profile(&self, external_id: &str, update: ProfileUpdate) -> StoreResult<Profile> {
        let mut profiles: RecordMap<Profile> = self.store.load_record_map(keys::PROFILES);

        let mut profile = profiles.items.remove(external_id).unwrap_or_default();
        profile.external_id = external_id.to_string();
        if let Some(bio) = update.bio {
            profile.bio = bio;
        }
        if let Some(area) = update.area {
            profile.area = area;
        }
        if let Some(contact) = update.contact {
            profile.contact = contact;
        }
        profile.updated_at = Utc::now();

        profiles.items.insert(external_id.to_string(), profile.clone());
        self.store.save_record_map(keys::PROFILES, &profiles)?;
        Ok(profile)
    }

    pub fn load_profile(&self, external_id: &str) -> Option<Profile> {
        let mut profiles: RecordMap<Profile> = self.store.load_record_map(keys::PROFILES);
        profiles.items.remove(external_id)
    }
}
