//! Editor panels
//!
//! Outliner, inspector, lights and render settings windows. Every panel
//! edits the [`Scene`] through its mutation API; rejected edits are logged
//! and leave the scene as it was.

use std::borrow::Cow;

use cgmath::Vector3;

use crate::assets::{BUILTIN_CUBE, BUILTIN_PLANE, BUILTIN_SPHERE};
use crate::config::ShadowResolutionConfig;
use crate::gfx::lighting::{Light, LightKind, LightType};
use crate::gfx::rendering::RenderMode;
use crate::gfx::scene::{NodeId, Scene, Transform};

/// Requests the panels cannot fulfil on their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    ReloadShaders,
}

/// One line of the outliner.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineRow {
    pub id: NodeId,
    pub name: String,
    pub depth: usize,
    pub selected: bool,
}

/// Flattens the scene tree in traversal order, root excluded.
pub fn outline_rows(scene: &Scene) -> Vec<OutlineRow> {
    let mut rows = Vec::new();
    scene.root().walk(&mut |node, depth| {
        if node.is_root() {
            return;
        }
        rows.push(OutlineRow {
            id: node.id(),
            name: node.name().to_owned(),
            depth: depth - 1,
            selected: node.is_selected(),
        });
    });
    rows
}

/// Inspector fields of a transform: position, euler degrees, scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformFields {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl From<&Transform> for TransformFields {
    fn from(transform: &Transform) -> Self {
        Self {
            position: transform.position().into(),
            rotation: transform.rotation_euler(),
            scale: transform.scale().into(),
        }
    }
}

impl TransformFields {
    pub fn to_transform(&self) -> Transform {
        let mut transform = Transform::from_position(self.position.into());
        transform.set_rotation_euler(self.rotation);
        transform.set_scale(self.scale.into());
        transform
    }
}

pub fn light_label(light: &Light, index: usize) -> String {
    format!("{} #{}", light.light_type().label(), index)
}

/// Panel state that lives across frames.
pub struct EditorPanels {
    load_path: String,
    shadow_resolutions: ShadowResolutionConfig,
    wireframe_supported: bool,
}

impl EditorPanels {
    pub fn new(shadow_resolutions: ShadowResolutionConfig, wireframe_supported: bool) -> Self {
        Self {
            load_path: String::new(),
            shadow_resolutions,
            wireframe_supported,
        }
    }

    /// Draws every panel and returns the actions the caller must perform.
    pub fn draw(&mut self, ui: &imgui::Ui, scene: &mut Scene) -> Vec<PanelAction> {
        let display_size = ui.io().display_size;
        // Guard against invalid display size that could cause crashes
        if display_size[0] <= 0.0 || display_size[1] <= 0.0 {
            return Vec::new();
        }

        let mut actions = Vec::new();
        self.outliner(ui, scene);
        inspector(ui, scene);
        self.lights(ui, scene);
        self.render_settings(ui, scene, &mut actions);
        actions
    }

    fn outliner(&mut self, ui: &imgui::Ui, scene: &mut Scene) {
        ui.window("Outliner")
            .size([300.0, 420.0], imgui::Condition::FirstUseEver)
            .position([20.0, 20.0], imgui::Condition::FirstUseEver)
            .build(|| {
                let target = scene.selection().first().copied().unwrap_or(NodeId::ROOT);

                ui.text("Add");
                for (label, path) in [("Cube", BUILTIN_CUBE), ("Sphere", BUILTIN_SPHERE), ("Plane", BUILTIN_PLANE)] {
                    ui.same_line();
                    if ui.button(label) {
                        scene.queue_model_load(path, target);
                    }
                }
                ui.set_next_item_width(-60.0);
                ui.input_text("##model_path", &mut self.load_path).build();
                ui.same_line();
                if ui.button("Load") && !self.load_path.trim().is_empty() {
                    scene.queue_model_load(self.load_path.trim(), target);
                }
                ui.separator();

                ui.child_window("scene_tree")
                    .size([0.0, -30.0])
                    .border(true)
                    .build(|| {
                        let rows = outline_rows(scene);
                        if rows.is_empty() {
                            ui.text_disabled("Empty scene");
                        }
                        for row in rows {
                            let _id = ui.push_id_usize(row.id.raw() as usize);
                            let indent = row.depth as f32 * 14.0;
                            if indent > 0.0 {
                                ui.indent_by(indent);
                            }
                            if ui.selectable_config(&row.name).selected(row.selected).build() {
                                scene.apply_pick(Some(row.id), ui.io().key_shift);
                            }
                            if indent > 0.0 {
                                ui.unindent_by(indent);
                            }
                        }
                    });

                let selection = scene.selection();
                let single = (selection.len() == 1).then(|| selection[0]);
                ui.disabled(single.is_none(), || {
                    if ui.button("Duplicate") {
                        if let Some(id) = single {
                            if let Err(err) = scene.duplicate_node(id) {
                                log::warn!("{}", err);
                            }
                        }
                    }
                });
                ui.same_line();
                ui.disabled(selection.is_empty(), || {
                    if ui.button("Delete") {
                        for id in &selection {
                            // A parent deleted earlier in this loop took its children along.
                            if scene.node(*id).is_none() {
                                continue;
                            }
                            if let Err(err) = scene.remove_node(*id) {
                                log::warn!("{}", err);
                            }
                        }
                    }
                });
            });
    }

    fn lights(&mut self, ui: &imgui::Ui, scene: &mut Scene) {
        ui.window("Lights")
            .size([320.0, 420.0], imgui::Condition::FirstUseEver)
            .position([20.0, 460.0], imgui::Condition::FirstUseEver)
            .build(|| {
                let res = &self.shadow_resolutions;
                if ui.button("+ Directional") {
                    scene.add_light(Light::directional(Vector3::new(-0.4, -1.0, -0.3), res.directional_resolution));
                }
                ui.same_line();
                if ui.button("+ Point") {
                    scene.add_light(Light::point(Vector3::new(0.0, 3.0, 0.0), 10.0, res.point_resolution));
                }
                ui.same_line();
                if ui.button("+ Spot") {
                    scene.add_light(Light::spot(
                        Vector3::new(0.0, 5.0, 0.0),
                        -Vector3::unit_y(),
                        15.0,
                        20.0,
                        30.0,
                        res.spot_resolution,
                    ));
                }
                ui.separator();

                for (kind_index, light_type) in LightType::ALL.into_iter().enumerate() {
                    let mut remove = None;
                    for (index, light) in scene.lights.lights_mut(light_type).iter_mut().enumerate() {
                        let _id = ui.push_id_usize(kind_index * 1000 + index);
                        if !ui.collapsing_header(light_label(light, index), imgui::TreeNodeFlags::empty()) {
                            continue;
                        }
                        light_controls(ui, light);
                        if ui.button("Remove") {
                            remove = Some(index);
                        }
                        ui.separator();
                    }
                    if let Some(index) = remove {
                        scene.remove_light(light_type, index);
                    }
                }
            });
    }

    fn render_settings(&mut self, ui: &imgui::Ui, scene: &mut Scene, actions: &mut Vec<PanelAction>) {
        let display_size = ui.io().display_size;
        ui.window("Render Settings")
            .size([300.0, 300.0], imgui::Condition::FirstUseEver)
            .position([display_size[0] - 320.0, 460.0], imgui::Condition::FirstUseEver)
            .build(|| {
                let mut mode_index = RenderMode::ALL
                    .iter()
                    .position(|mode| *mode == scene.settings.mode)
                    .unwrap_or(0);
                if ui.combo("Mode", &mut mode_index, &RenderMode::ALL, |mode| Cow::Borrowed(mode.label())) {
                    scene.set_render_mode(RenderMode::ALL[mode_index]);
                }
                if scene.settings.mode == RenderMode::Wireframe && !self.wireframe_supported {
                    ui.text_disabled("Line mode unsupported, drawing filled");
                }

                let settings = &mut scene.settings;
                ui.checkbox("Shadows", &mut settings.shadows_enabled);
                ui.checkbox("Skybox", &mut settings.show_skybox);
                ui.slider("Exposure", 0.05, 8.0, &mut settings.exposure);
                ui.slider("Gamma", 1.0, 3.0, &mut settings.gamma);
                ui.color_edit4("Outline", &mut settings.outline_color);
                ui.slider("Outline Scale", 1.0, 1.2, &mut settings.outline_scale);

                ui.separator();
                if ui.button("Reload Shaders") {
                    actions.push(PanelAction::ReloadShaders);
                }
                ui.text(format!("Nodes: {}", scene.node_count()));
                ui.text(format!("Lights: {}", scene.lights.len()));
            });
    }
}

fn inspector(ui: &imgui::Ui, scene: &mut Scene) {
    let display_size = ui.io().display_size;
    ui.window("Inspector")
        .size([300.0, 420.0], imgui::Condition::FirstUseEver)
        .position([display_size[0] - 320.0, 20.0], imgui::Condition::FirstUseEver)
        .build(|| {
            let selection = scene.selection();
            let [id] = selection.as_slice() else {
                ui.text_disabled(if selection.is_empty() {
                    "Nothing selected"
                } else {
                    "Multiple nodes selected"
                });
                return;
            };
            let id = *id;
            let Some(node) = scene.node(id) else {
                return;
            };

            ui.text(node.name());
            ui.separator();

            let mut fields = TransformFields::from(node.transform());
            let mut changed = false;
            changed |= imgui::Drag::new("Position").speed(0.05).build_array(ui, &mut fields.position);
            changed |= imgui::Drag::new("Rotation").speed(0.5).build_array(ui, &mut fields.rotation);
            changed |= imgui::Drag::new("Scale").speed(0.01).build_array(ui, &mut fields.scale);
            if changed {
                if let Err(err) = scene.set_node_transform(id, fields.to_transform()) {
                    log::warn!("{}", err);
                }
            }

            parent_combo(ui, scene, id);

            let Some(object) = scene.node_mut(id).and_then(|node| node.object_mut()) else {
                return;
            };
            ui.separator();
            ui.text(format!("Model: {}", object.model().name()));
            let material = object.material_mut();
            ui.color_edit4("Base Color", &mut material.base_color);
            ui.slider("Metallic", 0.0, 1.0, &mut material.metallic);
            ui.slider("Roughness", 0.04, 1.0, &mut material.roughness);
        });
}

fn parent_combo(ui: &imgui::Ui, scene: &mut Scene, id: NodeId) {
    let Some(current_parent) = scene.node(id).and_then(|node| node.parent()) else {
        return;
    };
    let mut candidates = vec![(NodeId::ROOT, "<root>".to_owned())];
    candidates.extend(
        outline_rows(scene)
            .into_iter()
            .filter(|row| row.id != id)
            .map(|row| (row.id, row.name)),
    );
    let mut index = candidates
        .iter()
        .position(|(candidate, _)| *candidate == current_parent)
        .unwrap_or(0);
    if ui.combo("Parent", &mut index, &candidates, |(_, name)| Cow::Borrowed(name.as_str())) {
        if let Err(err) = scene.reparent(id, candidates[index].0) {
            log::warn!("{}", err);
        }
    }
}

fn light_controls(ui: &imgui::Ui, light: &mut Light) {
    ui.checkbox("Visible", &mut light.visible);
    ui.same_line();
    ui.checkbox("Casts Shadows", &mut light.casts_shadows);
    ui.color_edit3("Color", &mut light.color);
    ui.slider("Power", 0.0, 100.0, &mut light.power);

    match *light.kind() {
        LightKind::Directional { direction } => {
            let mut value: [f32; 3] = direction.into();
            if imgui::Drag::new("Direction").speed(0.01).build_array(ui, &mut value) {
                light.set_direction(value.into());
            }
        }
        LightKind::Point { position, radius } => {
            let mut value: [f32; 3] = position.into();
            if imgui::Drag::new("Position").speed(0.05).build_array(ui, &mut value) {
                light.set_position(value.into());
            }
            let mut radius = radius;
            if ui.slider("Radius", 0.25, 100.0, &mut radius) {
                light.set_extent(radius);
            }
        }
        LightKind::Spot {
            position,
            direction,
            range,
            cut_off,
            outer_cut_off,
        } => {
            let mut value: [f32; 3] = position.into();
            if imgui::Drag::new("Position").speed(0.05).build_array(ui, &mut value) {
                light.set_position(value.into());
            }
            let mut value: [f32; 3] = direction.into();
            if imgui::Drag::new("Direction").speed(0.01).build_array(ui, &mut value) {
                light.set_direction(value.into());
            }
            let mut range = range;
            if ui.slider("Range", 0.25, 100.0, &mut range) {
                light.set_extent(range);
            }
            let mut inner = cut_off.acos().to_degrees();
            let mut outer = outer_cut_off.acos().to_degrees();
            let inner_changed = ui.slider("Inner Angle", 0.0, 85.0, &mut inner);
            let outer_changed = ui.slider("Outer Angle", 0.5, 85.0, &mut outer);
            if inner_changed || outer_changed {
                light.set_cutoff(inner, outer);
            }
        }
    }

    if ui.collapsing_header("Shadow Bias", imgui::TreeNodeFlags::empty()) {
        ui.slider("Normal Offset", 0.0, 0.2, &mut light.bias.normal_offset);
        ui.slider("Depth", 0.0, 0.05, &mut light.bias.depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::geometry::generate_cube;
    use crate::gfx::scene::{Material, Model};
    use approx::assert_relative_eq;
    use std::rc::Rc;

    #[test]
    fn test_outline_rows_follow_tree_order() {
        let mut scene = Scene::default();
        let model = Rc::new(Model::from_geometry("Cube", &generate_cube(1.0), Material::default()));
        let a = scene.add_object_node(NodeId::ROOT, "A", Rc::clone(&model)).unwrap();
        let b = scene.add_node(a, "B").unwrap();
        let c = scene.add_node(NodeId::ROOT, "C").unwrap();
        scene.apply_pick(Some(b), false);

        let rows = outline_rows(&scene);
        let summary: Vec<(NodeId, usize, bool)> = rows.iter().map(|r| (r.id, r.depth, r.selected)).collect();
        assert_eq!(summary, vec![(a, 0, false), (b, 1, true), (c, 0, false)]);
        assert_eq!(rows[1].name, "B");
    }

    #[test]
    fn test_transform_fields_round_trip_through_inspector() {
        let mut transform = Transform::from_position(Vector3::new(1.0, 2.0, 3.0));
        transform.set_rotation_euler([0.0, 45.0, 0.0]);
        transform.set_scale(Vector3::new(2.0, 2.0, 2.0));

        let fields = TransformFields::from(&transform);
        assert_eq!(fields.position, [1.0, 2.0, 3.0]);
        assert_relative_eq!(fields.rotation[1], 45.0, epsilon = 1e-3);

        let rebuilt = fields.to_transform();
        assert_eq!(rebuilt.position(), transform.position());
        assert_relative_eq!(rebuilt.scale().x, 2.0);
    }

    #[test]
    fn test_inspector_scale_never_reaches_zero() {
        let fields = TransformFields {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [0.0, -1.0, 1.0],
        };
        let transform = fields.to_transform();
        assert!(transform.scale().x > 0.0);
        assert!(transform.scale().y > 0.0);
    }

    #[test]
    fn test_light_labels() {
        let light = Light::point(Vector3::new(0.0, 1.0, 0.0), 5.0, 256);
        assert_eq!(light_label(&light, 2), format!("{} #2", LightType::Point.label()));
    }
}
