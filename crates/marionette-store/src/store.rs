//! The target store and the per-frame update loop.

use std::collections::HashSet;

use tracing::{debug, warn};

use nalgebra::{UnitQuaternion, Vector3};

use marionette_core::error::{ChainError, ConflictError, RigError};
use marionette_core::math;
use marionette_core::pose::RigPose;
use marionette_core::rig::{BoneGraph, PoseSampler, RigContext, RotationCurveStore};
use marionette_core::types::{BoneId, Joint, SolverKind, SpaceKind, SyncSource, MAX_LEVEL, MIN_LEVEL};
use marionette_core::IkSettings;
use marionette_ik::{direction_from_pose, SolveTarget};

use crate::target::{DirtyState, IkTarget};

/// Owns every IK target of one rig and runs the per-frame update.
///
/// The store upholds the cross-target rules the individual targets
/// cannot see: each bone belongs to at most one enabled chain, reserved
/// bones are off limits, and edits to one chain flag the Parent-space
/// targets anchored below it. Rejected mutations leave the store
/// unchanged.
pub struct TargetStore {
    targets: Vec<IkTarget>,
    selected: Option<usize>,
    settings: IkSettings,
    reserved: HashSet<BoneId>,
    name_counter: usize,
}

impl TargetStore {
    pub fn new(settings: IkSettings) -> Self {
        Self {
            targets: Vec::new(),
            selected: None,
            settings,
            reserved: HashSet::new(),
            name_counter: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(IkSettings::default())
    }

    // -- access -------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&IkTarget> {
        self.targets.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IkTarget> {
        self.targets.iter()
    }

    pub fn settings(&self) -> &IkSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: IkSettings) -> Result<(), RigError> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn select(&mut self, index: Option<usize>) {
        self.selected = match index {
            Some(i) if i < self.targets.len() => Some(i),
            _ => None,
        };
    }

    // -- reserved bones -----------------------------------------------------

    /// Mark a bone as owned by some other host feature; it can no longer
    /// join an enabled chain.
    pub fn reserve_bone(&mut self, bone: BoneId) {
        self.reserved.insert(bone);
    }

    pub fn release_bone(&mut self, bone: BoneId) {
        self.reserved.remove(&bone);
    }

    // -- conflicts ----------------------------------------------------------

    /// The enabled target (other than `exclude`) currently claiming
    /// `bone`, if any.
    fn claimed_by(&self, bone: BoneId, exclude: Option<usize>) -> Option<usize> {
        self.targets.iter().enumerate().position(|(i, t)| {
            Some(i) != exclude && t.enable && t.joints().iter().any(|j| j.bone == Some(bone))
        })
    }

    fn check_bone_free(&self, bone: BoneId, exclude: Option<usize>) -> Result<(), ConflictError> {
        if self.reserved.contains(&bone) {
            return Err(ConflictError::BoneReserved { bone });
        }
        if let Some(other) = self.claimed_by(bone, exclude) {
            return Err(ConflictError::BoneClaimed {
                bone,
                other: self.targets[other].name.clone(),
            });
        }
        Ok(())
    }

    // -- creation and removal -----------------------------------------------

    fn next_name(&mut self) -> String {
        loop {
            self.name_counter += 1;
            let candidate = format!("IK{}", self.name_counter);
            if !self.targets.iter().any(|t| t.name == candidate) {
                return candidate;
            }
        }
    }

    /// Create an enabled target with `effector` as the tip, growing the
    /// chain `level` joints toward the skeleton root (fewer if the root
    /// is hit first). Returns the new target's index.
    pub fn add_target(
        &mut self,
        ctx: &RigContext,
        effector: BoneId,
        level: usize,
    ) -> Result<usize, RigError> {
        let level = level.clamp(MIN_LEVEL, MAX_LEVEL);
        let mut joints = vec![Joint::new(effector)];
        let mut current = effector;
        while joints.len() < level {
            let Some(parent) = ctx.bones.parent(current) else {
                break;
            };
            joints.push(Joint::new(parent));
            current = parent;
        }
        if joints.len() < MIN_LEVEL {
            return Err(ChainError::TooShort(joints.len()).into());
        }
        for joint in &joints {
            if let Some(bone) = joint.bone {
                self.check_bone_free(bone, None)?;
            }
        }

        let name = self.next_name();
        let mut target = IkTarget::new(name, joints);
        target.rebuild(ctx.bones)?;
        target.mark_resolve();
        debug!(name = %target.name, level = target.level(), "added IK target");
        self.targets.push(target);
        Ok(self.targets.len() - 1)
    }

    /// Insert a target restored from a persisted record.
    ///
    /// Loading is best-effort: a chain that no longer validates stays in
    /// the store as an invalid target, and an enabled target whose bones
    /// are already claimed comes back disabled.
    pub fn insert_loaded(&mut self, ctx: &RigContext, mut target: IkTarget) -> usize {
        if let Err(err) = target.rebuild(ctx.bones) {
            warn!(name = %target.name, %err, "loaded target is invalid");
        }
        if target.enable {
            let conflict = target.joints().iter().filter_map(|j| j.bone).find(|&bone| {
                self.reserved.contains(&bone) || self.claimed_by(bone, None).is_some()
            });
            if let Some(bone) = conflict {
                warn!(name = %target.name, ?bone, "loaded target disabled: bone already claimed");
                target.enable = false;
            }
        }
        if target.enable && target.is_valid() {
            target.mark_resolve();
        } else {
            target.set_state(DirtyState::Clean);
        }
        self.targets.push(target);
        self.targets.len() - 1
    }

    pub fn remove_target(&mut self, index: usize) -> Option<IkTarget> {
        if index >= self.targets.len() {
            return None;
        }
        match self.selected {
            Some(s) if s == index => self.selected = None,
            Some(s) if s > index => self.selected = Some(s - 1),
            _ => {}
        }
        Some(self.targets.remove(index))
    }

    pub fn clear(&mut self) {
        self.targets.clear();
        self.selected = None;
    }

    // -- per-target edits ---------------------------------------------------
    //
    // Every index-based edit ignores a stale index, like remove_target.

    /// Enable or disable a target.
    ///
    /// Enabling re-checks every chain bone against reservations and other
    /// enabled chains and fails without mutating on conflict. Disabling
    /// clears the pending state and drops the selection if it pointed
    /// here.
    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<(), RigError> {
        if index >= self.targets.len() {
            return Ok(());
        }
        if enabled {
            let bones: Vec<BoneId> = self.targets[index]
                .joints()
                .iter()
                .filter_map(|j| j.bone)
                .collect();
            for bone in bones {
                self.check_bone_free(bone, Some(index))?;
            }
            let target = &mut self.targets[index];
            target.enable = true;
            if target.is_valid() {
                target.mark_resolve();
            }
        } else {
            let target = &mut self.targets[index];
            target.enable = false;
            target.set_state(DirtyState::Clean);
            if self.selected == Some(index) {
                self.selected = None;
            }
        }
        Ok(())
    }

    /// Switch the solver, re-validating the chain level and seeding the
    /// solver's pose parameters from the current pose so the switch does
    /// not visibly move the chain.
    pub fn set_solver_kind(
        &mut self,
        ctx: &RigContext,
        pose: &mut RigPose,
        index: usize,
        kind: SolverKind,
    ) -> Result<(), RigError> {
        if index >= self.targets.len() {
            return Ok(());
        }
        let previous = self.targets[index].solver_kind;
        self.targets[index].solver_kind = kind;
        if let Err(err) = self.targets[index].rebuild(ctx.bones) {
            self.targets[index].solver_kind = previous;
            let _ = self.targets[index].rebuild(ctx.bones);
            return Err(err.into());
        }

        if let Some(chain) = self.targets[index].chain().cloned() {
            if kind == SolverKind::Limb {
                self.targets[index].limb_direction_deg = direction_from_pose(&chain, pose);
            }
            let measured =
                self.targets[index]
                    .solver()
                    .get_swivel(&chain, pose, &self.settings);
            if self.targets[index].uses_swivel() {
                self.targets[index].swivel_deg = math::wrap_degrees(measured);
            }
        }

        self.targets[index].mark_resolve();
        self.propagate_dependents(ctx, index);
        Ok(())
    }

    /// Extend the chain by one joint toward the skeleton root.
    pub fn grow(&mut self, ctx: &RigContext, index: usize) -> Result<(), RigError> {
        let Some(target) = self.targets.get(index) else {
            return Ok(());
        };
        let level = target.level();
        target.solver().check_level(level + 1)?;
        if level >= MAX_LEVEL {
            return Err(ChainError::TooLong(level + 1).into());
        }
        let root = target
            .root_bone()
            .ok_or(ChainError::UnresolvedJoint { index: level - 1 })?;
        let parent = ctx.bones.parent(root).ok_or(ChainError::NoAncestor)?;
        if target.enable {
            self.check_bone_free(parent, Some(index))?;
        }

        self.targets[index].joints_mut().push(Joint::new(parent));
        self.targets[index].rebuild(ctx.bones)?;
        self.targets[index].mark_resolve();
        self.propagate_dependents(ctx, index);
        Ok(())
    }

    /// Drop the chain's root joint.
    pub fn shrink(&mut self, ctx: &RigContext, index: usize) -> Result<(), RigError> {
        let Some(target) = self.targets.get(index) else {
            return Ok(());
        };
        let level = target.level();
        target.solver().check_level(level - 1)?;
        if level <= MIN_LEVEL {
            return Err(ChainError::TooShort(level - 1).into());
        }

        self.targets[index].joints_mut().pop();
        self.targets[index].rebuild(ctx.bones)?;
        self.targets[index].mark_resolve();
        self.propagate_dependents(ctx, index);
        Ok(())
    }

    /// Move the stored goal position (in the target's own space).
    pub fn set_target_position(&mut self, ctx: &RigContext, index: usize, position: Vector3<f32>) {
        if index >= self.targets.len() {
            return;
        }
        self.targets[index].set_position(position);
        self.targets[index].mark_resolve();
        self.propagate_dependents(ctx, index);
    }

    /// Rotate the stored goal (in the target's own space).
    pub fn set_target_rotation(
        &mut self,
        ctx: &RigContext,
        index: usize,
        rotation: UnitQuaternion<f32>,
    ) {
        if index >= self.targets.len() {
            return;
        }
        self.targets[index].set_rotation(rotation);
        self.targets[index].mark_resolve();
        self.propagate_dependents(ctx, index);
    }

    /// Set the swivel angle, wrapped into (-180, 180].
    pub fn set_swivel(&mut self, ctx: &RigContext, index: usize, deg: f32) {
        if index >= self.targets.len() {
            return;
        }
        self.targets[index].swivel_deg = math::wrap_degrees(deg);
        self.targets[index].mark_resolve();
        self.propagate_dependents(ctx, index);
    }

    /// Switch the goal's storage space without moving it in world space.
    pub fn set_space(
        &mut self,
        pose: &RigPose,
        index: usize,
        space: SpaceKind,
        parent_ref: Option<BoneId>,
    ) {
        if let Some(target) = self.targets.get_mut(index) {
            target.change_space(pose, space, parent_ref);
        }
    }

    /// Flag a target for sync without resolving (the skeleton moved under
    /// an unchanged goal).
    pub fn mark_sync(&mut self, index: usize) {
        if let Some(target) = self.targets.get_mut(index) {
            target.mark_sync();
        }
    }

    // -- skeleton changes ---------------------------------------------------

    /// Rebuild every chain after a skeleton change. Chains that no longer
    /// validate become invalid and are skipped by the update.
    pub fn rebuild(&mut self, ctx: &RigContext) {
        for target in &mut self.targets {
            if let Err(err) = target.rebuild(ctx.bones) {
                warn!(name = %target.name, %err, "chain no longer valid");
            }
            if target.is_valid() {
                target.mark_resolve();
            }
        }
    }

    /// A single bone changed (renamed, re-parented, transformed outside
    /// the curves): revalidate and re-flag every chain touching it.
    pub fn invalidate_bone(&mut self, ctx: &RigContext, bone: BoneId) {
        for index in 0..self.targets.len() {
            let touches = self.targets[index]
                .joints()
                .iter()
                .any(|j| j.bone == Some(bone));
            if touches {
                let _ = self.targets[index].rebuild(ctx.bones);
                self.targets[index].mark_resolve();
                self.propagate_dependents(ctx, index);
            }
        }
    }

    /// Flag every enabled Parent-space target whose reference bone is a
    /// chain bone of `changed`, or a descendant of one: re-solving
    /// `changed` will move their goal frame.
    fn propagate_dependents(&mut self, ctx: &RigContext, changed: usize) {
        let changed_bones: Vec<BoneId> = self.targets[changed]
            .joints()
            .iter()
            .filter_map(|j| j.bone)
            .collect();
        for (index, target) in self.targets.iter_mut().enumerate() {
            if index == changed || !target.enable || target.space != SpaceKind::Parent {
                continue;
            }
            let Some(anchor) = target.parent_ref else {
                continue;
            };
            let dependent = changed_bones
                .iter()
                .any(|&bone| bone == anchor || ctx.bones.is_ancestor(bone, anchor));
            if dependent {
                target.mark_resolve();
            }
        }
    }

    // -- update loop --------------------------------------------------------

    /// Per-frame update at `time`.
    ///
    /// Solves every enabled, valid, resolve-flagged target against the
    /// scene pose and writes the solved local rotations into the curves.
    /// When any enabled Parent-space target has a resolved reference
    /// bone, a second pass re-samples the scene (now including the keys
    /// written by the first pass) and solves again, so goals anchored to
    /// another chain's bones see that chain settled. Solved targets then
    /// sync their stored values from the final pose.
    pub fn update_ik(
        &mut self,
        ctx: &RigContext,
        curves: &mut dyn RotationCurveStore,
        pose: &mut RigPose,
        time: f32,
    ) {
        let mut dirty = Vec::new();
        for (index, target) in self.targets.iter().enumerate() {
            if !target.enable || target.state() != DirtyState::NeedsResolve {
                continue;
            }
            if !target.is_valid() {
                warn!(name = %target.name, "skipping invalid target");
                continue;
            }
            dirty.push(index);
        }

        if !dirty.is_empty() {
            let passes = if self.needs_second_pass() {
                self.settings.max_update_passes.min(2).max(1)
            } else {
                1
            };
            for pass in 0..passes {
                ctx.sampler.sample_scene(time, pose);
                debug!(pass, targets = dirty.len(), "resolving IK targets");
                for &index in &dirty {
                    Self::resolve_target(&self.targets[index], &self.settings, curves, pose, time);
                }
            }
            for &index in &dirty {
                // Local-space goals follow the chain root's parent, which
                // this solve cannot have moved.
                let next = if self.targets[index].space == SpaceKind::Local {
                    DirtyState::Clean
                } else {
                    DirtyState::NeedsSync
                };
                self.targets[index].set_state(next);
            }
        }

        let any_sync = self
            .targets
            .iter()
            .any(|t| t.state() == DirtyState::NeedsSync);
        if any_sync {
            if dirty.is_empty() {
                ctx.sampler.sample_scene(time, pose);
            }
            for index in 0..self.targets.len() {
                if self.targets[index].state() == DirtyState::NeedsSync {
                    // Targets this update just resolved sync off the live
                    // solved pose; everything else follows its own default.
                    let source = if dirty.contains(&index) {
                        Some(SyncSource::SceneObject)
                    } else {
                        None
                    };
                    self.synchro_set(ctx, pose, index, source, time);
                }
            }
        }
    }

    /// Whether the pass-2 ordering dependency exists: some enabled target
    /// stores its goal relative to a resolved reference bone.
    fn needs_second_pass(&self) -> bool {
        self.targets.iter().any(|t| {
            t.enable && t.is_valid() && t.space == SpaceKind::Parent && t.parent_ref.is_some()
        })
    }

    fn resolve_target(
        target: &IkTarget,
        settings: &IkSettings,
        curves: &mut dyn RotationCurveStore,
        pose: &mut RigPose,
        time: f32,
    ) {
        let Some(chain) = target.chain() else {
            return;
        };
        let position = target.world_position(pose);
        let rotation = if target.auto_rotation {
            None
        } else {
            Some(target.world_rotation(pose))
        };
        target
            .solver()
            .solve(chain, pose, &SolveTarget { position, rotation }, settings);

        for joint in chain.joints() {
            let repr = curves.curve_repr(joint.bone).unwrap_or_default();
            let fixed = math::fix_reverse_rotation(
                pose.local_rotation(joint.bone),
                &pose.bind_local_rotation(joint.bone),
            );
            curves.write_key(joint.bone, time, fixed, repr);
        }
    }

    /// Re-derive a target's stored position/rotation (and swivel, where
    /// the solver uses it) from a resolved pose, without solving.
    ///
    /// `source` overrides the target's default: [`SyncSource::SceneObject`]
    /// reads the live scene pose in `pose`, [`SyncSource::Skeleton`]
    /// samples the pre-IK animation onto an isolated pose first.
    pub fn synchro_set(
        &mut self,
        ctx: &RigContext,
        pose: &mut RigPose,
        index: usize,
        source: Option<SyncSource>,
        time: f32,
    ) {
        let Some(target) = self.targets.get(index) else {
            return;
        };
        if !target.is_valid() {
            self.targets[index].set_state(DirtyState::Clean);
            return;
        }
        let source = source.unwrap_or(target.default_sync);

        match source {
            SyncSource::SceneObject => {
                Self::derive_from_pose(&mut self.targets[index], pose, &self.settings);
            }
            SyncSource::Skeleton => {
                let mut isolated = ctx.sampler.make_pose();
                ctx.sampler.sample_skeleton(time, &mut isolated);
                Self::derive_from_pose(&mut self.targets[index], &mut isolated, &self.settings);
            }
        }
        self.targets[index].set_state(DirtyState::Clean);
    }

    fn derive_from_pose(target: &mut IkTarget, pose: &mut RigPose, settings: &IkSettings) {
        let Some(chain) = target.chain().cloned() else {
            return;
        };
        let tip = chain.tip();
        let world_pos = pose.world_position(tip);
        let world_rot = pose.world_rotation(tip);
        target.set_world_position(pose, world_pos);
        if !target.auto_rotation {
            target.set_world_rotation(pose, world_rot);
        }
        if target.uses_swivel() {
            let measured = target.solver().get_swivel(&chain, pose, settings);
            target.swivel_deg = math::wrap_degrees(measured);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
