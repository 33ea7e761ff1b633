//! Effective permission resolution.
//!
//! [`PermissionResolver`] computes what a member (or a role) may do in a
//! guild and in one of its channels, from cached records only. Nothing here
//! awaits or touches the cache; the pipeline resolves records first.
//!
//! # Channel overwrite order
//!
//! Starting from the guild-level mask, overwrites are applied as
//! `(bits & !deny) | allow` in this order:
//!
//! 1. the "everyone" overwrite (target id == guild id)
//! 2. the union of every overwrite targeting one of the member's roles
//!    (all denies and all allows combined before applying)
//! 3. the overwrite targeting the member itself
//!
//! Threads carry no overwrites of their own and use their parent's. In a
//! thread, `SEND_MESSAGES_IN_THREADS` also grants `SEND_MESSAGES`.

use tracing::trace;

use arbor_core::{Guild, Member, Overwrite, Permission, Permissions, Role, Snowflake};

/// Overwrites in effect for a channel, derived on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOverwriteContext {
    pub overwrites: Vec<Overwrite>,
    /// Id of the guild the overwrites belong to. The "everyone" overwrite uses it.
    pub guild_id: Snowflake,
    pub is_thread: bool,
}

/// Stateless permission calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionResolver;

impl PermissionResolver {
    /// Creates a resolver. It holds no state, so one instance can be shared.
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    // Guild level
    // =========================================================================

    /// "everyone" role mask OR every held role's mask, plus administrator for
    /// the guild owner.
    pub fn base_permissions(&self, guild: &Guild, member: &Member) -> Permissions {
        let mut permissions = guild
            .everyone_role()
            .map(|role| role.permissions)
            .unwrap_or_default();

        for role_id in &member.roles {
            if let Some(role) = guild.role(*role_id) {
                permissions |= role.permissions;
            }
        }

        if guild.owner_id == member.user_id {
            permissions.insert(Permission::Administrator);
        }

        permissions
    }

    // =========================================================================
    // Channel level
    // =========================================================================

    /// Collects the overwrites that apply to `channel_id`.
    ///
    /// For a thread the parent's overwrites are used. Returns `None` if the
    /// channel, or a thread's parent, is not in the guild.
    pub fn channel_context(
        &self,
        guild: &Guild,
        channel_id: Snowflake,
    ) -> Option<ChannelOverwriteContext> {
        let channel = guild.channel(channel_id)?;
        let is_thread = channel.kind.is_thread();

        let source = if is_thread {
            guild.channel(channel.parent_id?)?
        } else {
            channel
        };

        Some(ChannelOverwriteContext {
            overwrites: source.overwrites.clone(),
            guild_id: source.guild_id.unwrap_or(guild.id),
            is_thread,
        })
    }

    /// The member's effective mask in a channel. Empty if the channel cannot
    /// be resolved.
    pub fn channel_permissions(
        &self,
        guild: &Guild,
        channel_id: Snowflake,
        member: &Member,
    ) -> Permissions {
        let Some(context) = self.channel_context(guild, channel_id) else {
            trace!(channel_id = %channel_id, "Channel context unavailable");
            return Permissions::NONE;
        };

        let base = self.base_permissions(guild, member);
        Self::apply_overwrites(base, &context, &member.roles, member.user_id)
    }

    /// A role's effective mask in a channel. Only the "everyone" overwrite and
    /// the role's own overwrite apply.
    pub fn channel_permissions_for_role(
        &self,
        guild: &Guild,
        channel_id: Snowflake,
        role_id: Snowflake,
    ) -> Permissions {
        let Some(role) = guild.role(role_id) else {
            return Permissions::NONE;
        };
        let Some(context) = self.channel_context(guild, channel_id) else {
            return Permissions::NONE;
        };

        Self::apply_overwrites(role.permissions, &context, &[], role_id)
    }

    fn apply_overwrites(
        mut permissions: Permissions,
        context: &ChannelOverwriteContext,
        role_ids: &[Snowflake],
        target_id: Snowflake,
    ) -> Permissions {
        let overwrites = &context.overwrites;

        if let Some(everyone) = overwrites.iter().find(|o| o.id == context.guild_id) {
            permissions = permissions.apply_overwrite(everyone.allow, everyone.deny);
        }

        if !role_ids.is_empty() {
            let (allow, deny) = overwrites
                .iter()
                .filter(|o| role_ids.contains(&o.id))
                .fold((Permissions::NONE, Permissions::NONE), |(allow, deny), o| {
                    (allow | o.allow, deny | o.deny)
                });
            permissions = permissions.apply_overwrite(allow, deny);
        }

        if let Some(target) = overwrites.iter().find(|o| o.id == target_id) {
            permissions = permissions.apply_overwrite(target.allow, target.deny);
        }

        if context.is_thread && permissions.contains(Permission::SendMessagesInThreads) {
            permissions.insert(Permission::SendMessages);
        }

        permissions
    }

    // =========================================================================
    // Checks
    // =========================================================================

    /// The subset of `required` not present in `permissions`, in input order.
    /// Always empty when the administrator flag is set.
    pub fn missing_permissions(
        &self,
        permissions: Permissions,
        required: &[Permission],
    ) -> Vec<Permission> {
        if permissions.is_admin() {
            return Vec::new();
        }
        required
            .iter()
            .copied()
            .filter(|flag| !permissions.contains(*flag))
            .collect()
    }

    /// Flags in `required` that the member lacks at guild level.
    ///
    /// # Arguments
    ///
    /// * `guild` - The guild whose roles and owner are consulted.
    /// * `member` - The member being checked.
    /// * `required` - The flags to look for.
    ///
    /// # Returns
    ///
    /// The missing flags in `required` order. Empty for administrators and
    /// the guild owner.
    pub fn missing_guild_permissions(
        &self,
        guild: &Guild,
        member: &Member,
        required: &[Permission],
    ) -> Vec<Permission> {
        self.missing_permissions(self.base_permissions(guild, member), required)
    }

    /// Flags in `required` that the member lacks in `channel_id`, after
    /// overwrites.
    ///
    /// # Arguments
    ///
    /// * `guild` - The guild that owns the channel.
    /// * `channel_id` - The channel, or thread, being checked.
    /// * `member` - The member being checked.
    /// * `required` - The flags to look for.
    ///
    /// # Returns
    ///
    /// The missing flags in `required` order. Every flag is missing when the
    /// channel cannot be resolved in `guild`.
    pub fn missing_channel_permissions(
        &self,
        guild: &Guild,
        channel_id: Snowflake,
        member: &Member,
        required: &[Permission],
    ) -> Vec<Permission> {
        self.missing_permissions(self.channel_permissions(guild, channel_id, member), required)
    }

    /// Whether the member holds every flag in `required` at guild level.
    pub fn has_guild_permissions(
        &self,
        guild: &Guild,
        member: &Member,
        required: &[Permission],
    ) -> bool {
        self.missing_guild_permissions(guild, member, required)
            .is_empty()
    }

    /// Whether the member holds every flag in `required` in `channel_id`.
    pub fn has_channel_permissions(
        &self,
        guild: &Guild,
        channel_id: Snowflake,
        member: &Member,
        required: &[Permission],
    ) -> bool {
        self.missing_channel_permissions(guild, channel_id, member, required)
            .is_empty()
    }

    // =========================================================================
    // Role hierarchy
    // =========================================================================

    /// The member's highest role; the "everyone" role if they hold none.
    pub fn highest_role<'g>(&self, guild: &'g Guild, member: &Member) -> Option<&'g Role> {
        if member.roles.is_empty() {
            return guild.everyone_role();
        }

        member
            .roles
            .iter()
            .filter_map(|id| guild.role(*id))
            .reduce(|best, role| if Self::outranks(role, best) { role } else { best })
    }

    /// Whether `role_id` sits above `other_role_id`. `false` if either is unknown.
    pub fn higher_role_position(
        &self,
        guild: &Guild,
        role_id: Snowflake,
        other_role_id: Snowflake,
    ) -> bool {
        match (guild.role(role_id), guild.role(other_role_id)) {
            (Some(role), Some(other)) => Self::outranks(role, other),
            _ => false,
        }
    }

    /// Whether the member's highest role sits above `role_id`. Owners always do.
    pub fn is_higher_position(&self, guild: &Guild, member: &Member, role_id: Snowflake) -> bool {
        if guild.owner_id == member.user_id {
            return true;
        }
        self.highest_role(guild, member)
            .is_some_and(|highest| self.higher_role_position(guild, highest.id, role_id))
    }

    /// Position descending; on a tie the smaller id ranks higher.
    fn outranks(role: &Role, other: &Role) -> bool {
        role.position > other.position || (role.position == other.position && role.id < other.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::{Channel, ChannelType, OverwriteKind};

    const GUILD: Snowflake = Snowflake(100);
    const OWNER: Snowflake = Snowflake(1);
    const USER: Snowflake = Snowflake(2);
    const MOD_ROLE: Snowflake = Snowflake(200);
    const HELPER_ROLE: Snowflake = Snowflake(201);
    const TEXT: Snowflake = Snowflake(300);
    const THREAD: Snowflake = Snowflake(301);

    fn perms(flags: &[Permission]) -> Permissions {
        Permissions::from_flags(flags)
    }

    fn role(id: Snowflake, position: i32, flags: &[Permission]) -> Role {
        Role {
            id,
            position,
            permissions: perms(flags),
        }
    }

    fn overwrite(id: Snowflake, kind: OverwriteKind, allow: &[Permission], deny: &[Permission]) -> Overwrite {
        Overwrite {
            id,
            kind,
            allow: perms(allow),
            deny: perms(deny),
        }
    }

    fn channel(id: Snowflake, kind: ChannelType, parent: Option<Snowflake>, overwrites: Vec<Overwrite>) -> Channel {
        Channel {
            id,
            guild_id: Some(GUILD),
            kind,
            parent_id: parent,
            overwrites,
        }
    }

    fn member(user_id: Snowflake, roles: &[Snowflake]) -> Member {
        Member {
            user_id,
            guild_id: GUILD,
            roles: roles.to_vec(),
        }
    }

    fn guild_with(overwrites: Vec<Overwrite>) -> Guild {
        Guild::new(GUILD, OWNER)
            .with_role(role(GUILD, 0, &[Permission::ViewChannel, Permission::SendMessages]))
            .with_role(role(MOD_ROLE, 5, &[Permission::KickMembers]))
            .with_role(role(HELPER_ROLE, 3, &[Permission::ManageMessages]))
            .with_channel(channel(TEXT, ChannelType::GuildText, None, overwrites))
            .with_channel(channel(THREAD, ChannelType::PublicThread, Some(TEXT), Vec::new()))
    }

    #[test]
    fn test_base_permissions_combine_everyone_and_roles() {
        let resolver = PermissionResolver::new();
        let guild = guild_with(Vec::new());
        let base = resolver.base_permissions(&guild, &member(USER, &[MOD_ROLE]));

        assert!(base.contains(Permission::ViewChannel));
        assert!(base.contains(Permission::KickMembers));
        assert!(!base.contains(Permission::ManageMessages));
        assert!(!base.is_admin());
    }

    #[test]
    fn test_owner_is_always_admin() {
        let resolver = PermissionResolver::new();
        let guild = guild_with(Vec::new());
        let base = resolver.base_permissions(&guild, &member(OWNER, &[]));

        assert!(base.is_admin());
        assert!(
            resolver
                .missing_guild_permissions(&guild, &member(OWNER, &[]), &[Permission::BanMembers])
                .is_empty()
        );
    }

    #[test]
    fn test_admin_short_circuits_missing_permissions() {
        let resolver = PermissionResolver::new();
        let admin = perms(&[Permission::Administrator]);
        let required = [Permission::BanMembers, Permission::ManageGuild, Permission::SendPolls];
        assert!(resolver.missing_permissions(admin, &required).is_empty());
    }

    #[test]
    fn test_missing_permissions_preserves_order() {
        let resolver = PermissionResolver::new();
        let have = perms(&[Permission::SendMessages]);
        let missing = resolver.missing_permissions(
            have,
            &[Permission::ManageRoles, Permission::SendMessages, Permission::BanMembers],
        );
        assert_eq!(missing, vec![Permission::ManageRoles, Permission::BanMembers]);
    }

    #[test]
    fn test_overwrite_stages_apply_in_order() {
        let resolver = PermissionResolver::new();
        let user = member(USER, &[MOD_ROLE]);

        // Stage 1: everyone deny removes SEND_MESSAGES.
        let guild = guild_with(vec![overwrite(
            GUILD,
            OverwriteKind::Role,
            &[],
            &[Permission::SendMessages],
        )]);
        let bits = resolver.channel_permissions(&guild, TEXT, &user);
        assert!(!bits.contains(Permission::SendMessages));

        // Stage 2: role allow recovers it.
        let guild = guild_with(vec![
            overwrite(GUILD, OverwriteKind::Role, &[], &[Permission::SendMessages]),
            overwrite(MOD_ROLE, OverwriteKind::Role, &[Permission::SendMessages], &[]),
        ]);
        let bits = resolver.channel_permissions(&guild, TEXT, &user);
        assert!(bits.contains(Permission::SendMessages));

        // Stage 3: member deny removes it again, member allow wins over role deny.
        let guild = guild_with(vec![
            overwrite(GUILD, OverwriteKind::Role, &[], &[Permission::SendMessages]),
            overwrite(MOD_ROLE, OverwriteKind::Role, &[Permission::SendMessages], &[]),
            overwrite(USER, OverwriteKind::Member, &[], &[Permission::SendMessages]),
        ]);
        let bits = resolver.channel_permissions(&guild, TEXT, &user);
        assert!(!bits.contains(Permission::SendMessages));

        let guild = guild_with(vec![
            overwrite(MOD_ROLE, OverwriteKind::Role, &[], &[Permission::ViewChannel]),
            overwrite(USER, OverwriteKind::Member, &[Permission::ViewChannel], &[]),
        ]);
        let bits = resolver.channel_permissions(&guild, TEXT, &user);
        assert!(bits.contains(Permission::ViewChannel));
    }

    #[test]
    fn test_role_overwrites_are_aggregated_before_applying() {
        let resolver = PermissionResolver::new();
        let user = member(USER, &[MOD_ROLE, HELPER_ROLE]);

        // One role denies what another allows: allow wins because denies are
        // cleared first and allows set after.
        let guild = guild_with(vec![
            overwrite(MOD_ROLE, OverwriteKind::Role, &[], &[Permission::AttachFiles]),
            overwrite(HELPER_ROLE, OverwriteKind::Role, &[Permission::AttachFiles], &[]),
        ]);
        let bits = resolver.channel_permissions(&guild, TEXT, &user);
        assert!(bits.contains(Permission::AttachFiles));
    }

    #[test]
    fn test_thread_grants_send_messages_from_thread_flag() {
        let resolver = PermissionResolver::new();
        let user = member(USER, &[]);
        let overwrites = vec![overwrite(
            GUILD,
            OverwriteKind::Role,
            &[Permission::SendMessagesInThreads],
            &[Permission::SendMessages],
        )];
        let guild = guild_with(overwrites);

        let in_thread = resolver.channel_permissions(&guild, THREAD, &user);
        assert!(in_thread.contains(Permission::SendMessages));

        let in_parent = resolver.channel_permissions(&guild, TEXT, &user);
        assert!(in_parent.contains(Permission::SendMessagesInThreads));
        assert!(!in_parent.contains(Permission::SendMessages));
    }

    #[test]
    fn test_thread_uses_parent_overwrites() {
        let resolver = PermissionResolver::new();
        let guild = guild_with(vec![overwrite(
            GUILD,
            OverwriteKind::Role,
            &[],
            &[Permission::ViewChannel],
        )]);

        let context = resolver.channel_context(&guild, THREAD).unwrap();
        assert!(context.is_thread);
        assert_eq!(context.guild_id, GUILD);
        assert_eq!(context.overwrites.len(), 1);
    }

    #[test]
    fn test_missing_channel_or_parent_yields_no_context() {
        let resolver = PermissionResolver::new();
        let guild = guild_with(Vec::new()).with_channel(channel(
            Snowflake(999),
            ChannelType::PrivateThread,
            Some(Snowflake(12345)),
            Vec::new(),
        ));

        assert!(resolver.channel_context(&guild, Snowflake(4242)).is_none());
        assert!(resolver.channel_context(&guild, Snowflake(999)).is_none());
        assert_eq!(
            resolver.channel_permissions(&guild, Snowflake(999), &member(USER, &[])),
            Permissions::NONE
        );
    }

    #[test]
    fn test_role_channel_permissions_ignore_other_roles() {
        let resolver = PermissionResolver::new();
        let guild = guild_with(vec![
            overwrite(GUILD, OverwriteKind::Role, &[Permission::AddReactions], &[]),
            overwrite(MOD_ROLE, OverwriteKind::Role, &[], &[Permission::KickMembers]),
            overwrite(HELPER_ROLE, OverwriteKind::Role, &[Permission::BanMembers], &[]),
        ]);

        let bits = resolver.channel_permissions_for_role(&guild, TEXT, MOD_ROLE);
        assert!(bits.contains(Permission::AddReactions));
        assert!(!bits.contains(Permission::KickMembers));
        assert!(!bits.contains(Permission::BanMembers));
    }

    #[test]
    fn test_highest_role_tie_breaks_on_smaller_id() {
        let resolver = PermissionResolver::new();
        let guild = guild_with(Vec::new())
            .with_role(role(Snowflake(500), 9, &[]))
            .with_role(role(Snowflake(400), 9, &[]));

        let user = member(USER, &[MOD_ROLE, Snowflake(500), Snowflake(400)]);
        assert_eq!(resolver.highest_role(&guild, &user).map(|r| r.id), Some(Snowflake(400)));

        let roleless = member(USER, &[]);
        assert_eq!(resolver.highest_role(&guild, &roleless).map(|r| r.id), Some(GUILD));

        assert!(resolver.higher_role_position(&guild, Snowflake(400), Snowflake(500)));
        assert!(!resolver.higher_role_position(&guild, Snowflake(500), Snowflake(400)));
        assert!(!resolver.higher_role_position(&guild, Snowflake(400), Snowflake(1)));
    }

    #[test]
    fn test_is_higher_position() {
        let resolver = PermissionResolver::new();
        let guild = guild_with(Vec::new());

        assert!(resolver.is_higher_position(&guild, &member(USER, &[MOD_ROLE]), HELPER_ROLE));
        assert!(!resolver.is_higher_position(&guild, &member(USER, &[HELPER_ROLE]), MOD_ROLE));
        assert!(resolver.is_higher_position(&guild, &member(OWNER, &[]), MOD_ROLE));
    }
}
