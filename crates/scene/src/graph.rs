use foundation::math::{GeoPoint, GeoRangeError, Vec3};
use tracing::debug;

use crate::components::{Drawable3D, LightRig, Material, TextureSlot, Transform, Visibility};
use crate::entity::{MarkerId, NodeId};
use crate::labels::LabelOverlay;
use crate::picking::{PickHit, Ray, pick_markers};
use crate::prefabs::{GlobeHandle, GlobeParams, spawn_background, spawn_globe};

#[derive(Debug, Clone, PartialEq)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    transform: Transform,
    visibility: Visibility,
    drawable: Option<Drawable3D>,
}

/// One POI marker, placed in the globe's local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: MarkerId,
    pub node: NodeId,
    pub point: GeoPoint,
    pub local_position: Vec3,
}

impl Marker {
    pub fn label(&self) -> &str {
        self.point.label()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MarkerStyle {
    pub radius: f64,
    pub segments: u32,
    pub color: [f32; 4],
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            radius: 0.04,
            segments: 12,
            color: [1.0, 0.25, 0.25, 0.95],
        }
    }
}

/// Owns every mesh, light and marker in the visualization.
///
/// Nodes live in slot vectors; markers are children of the globe node so they
/// inherit its rotation.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Option<Node>>,
    /// Emptied slots in `nodes`, reused by `spawn`.
    free: Vec<u32>,
    globe: Option<GlobeHandle>,
    background: Option<NodeId>,
    lights: LightRig,
    markers: Vec<Marker>,
    marker_style: MarkerStyle,
    label: LabelOverlay,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_marker_style(marker_style: MarkerStyle) -> Self {
        Self {
            marker_style,
            ..Self::default()
        }
    }

    pub fn spawn(&mut self, name: &str, parent: Option<NodeId>, transform: Transform) -> NodeId {
        let node = Node {
            name: name.to_string(),
            parent,
            transform,
            visibility: Visibility::visible(),
            drawable: None,
        };
        if let Some(index) = self.free.pop() {
            self.nodes[index as usize] = Some(node);
            return NodeId(index);
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        id
    }

    pub fn set_drawable(&mut self, node: NodeId, drawable: Drawable3D) {
        if let Some(n) = self.node_mut(node) {
            n.drawable = Some(drawable);
        }
    }

    pub fn set_visibility(&mut self, node: NodeId, visibility: Visibility) {
        if let Some(n) = self.node_mut(node) {
            n.visibility = visibility;
        }
    }

    pub fn node_name(&self, node: NodeId) -> Option<&str> {
        self.node(node).map(|n| n.name.as_str())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index() as usize).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index() as usize).and_then(|n| n.as_mut())
    }

    /// Creates the globe sphere at `params.radius` and its glow shell.
    pub fn build_globe(&mut self, params: &GlobeParams, texture: TextureSlot) -> GlobeHandle {
        let handle = spawn_globe(self, params, texture);
        self.globe = Some(handle);
        handle
    }

    pub fn build_background(&mut self, radius: f64, segments: u32, texture: TextureSlot) -> NodeId {
        let node = spawn_background(self, radius, segments, texture);
        self.background = Some(node);
        node
    }

    pub fn set_lights(&mut self, lights: LightRig) {
        self.lights = lights;
    }

    pub fn lights(&self) -> &LightRig {
        &self.lights
    }

    pub fn globe(&self) -> Option<GlobeHandle> {
        self.globe
    }

    pub fn background(&self) -> Option<NodeId> {
        self.background
    }

    pub fn globe_radius(&self) -> Option<f64> {
        self.globe.map(|g| g.radius)
    }

    pub fn globe_rotation(&self) -> f64 {
        self.globe
            .and_then(|g| self.node(g.globe))
            .map(|n| n.transform.rotation_y)
            .unwrap_or(0.0)
    }

    pub fn set_globe_rotation(&mut self, rotation_y: f64) {
        let Some(globe) = self.globe else {
            return;
        };
        if let Some(n) = self.node_mut(globe.globe) {
            n.transform.rotation_y = rotation_y;
        }
    }

    /// One marker per point, in input order, on the globe surface.
    ///
    /// All points are projected before anything is inserted, so a bad point
    /// leaves the group untouched.
    pub fn add_markers(&mut self, points: &[GeoPoint]) -> Result<MarkerGroup<'_>, GeoRangeError> {
        let radius = self.globe_radius().unwrap_or(1.0);
        let positions = points
            .iter()
            .map(|p| p.project(radius))
            .collect::<Result<Vec<_>, _>>()?;

        let parent = self.globe.map(|g| g.globe);
        let style = self.marker_style;
        for (point, local_position) in points.iter().zip(positions) {
            let node = self.spawn(point.label(), parent, Transform::translate(local_position));
            self.set_drawable(
                node,
                Drawable3D::sphere(
                    style.radius,
                    style.segments,
                    Material::Unlit { color: style.color },
                ),
            );
            let id = MarkerId(self.markers.len() as u32);
            self.markers.push(Marker {
                id,
                node,
                point: point.clone(),
                local_position,
            });
        }
        debug!(count = points.len(), total = self.markers.len(), "markers added");
        Ok(self.markers())
    }

    /// Drop every marker (and its node).
    pub fn remove_markers(&mut self) {
        for marker in std::mem::take(&mut self.markers) {
            if let Some(slot) = self.nodes.get_mut(marker.node.index() as usize) {
                if slot.take().is_some() {
                    self.free.push(marker.node.index());
                }
            }
        }
        self.label.hide();
    }

    pub fn markers(&self) -> MarkerGroup<'_> {
        MarkerGroup { graph: self }
    }

    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(id.index())
    }

    pub fn marker_style(&self) -> MarkerStyle {
        self.marker_style
    }

    /// Show the single label with `text` at `anchor` (globe-local frame).
    pub fn set_label_text(&mut self, text: &str, anchor: Vec3) {
        self.label.show(text, anchor, None);
    }

    /// Show the label for a marker at `lift` times the globe radius.
    pub fn show_marker_label(&mut self, id: MarkerId, lift: f64) -> bool {
        let radius = self.globe_radius().unwrap_or(1.0);
        let Some(marker) = self.markers.get(id.index()) else {
            return false;
        };
        let Ok(anchor) = marker.point.project(radius * lift) else {
            return false;
        };
        self.label.show(marker.point.label(), anchor, Some(id));
        true
    }

    pub fn hide_label(&mut self) {
        self.label.hide();
    }

    pub fn label(&self) -> &LabelOverlay {
        &self.label
    }

    /// Label anchor in world space, if the label is visible.
    pub fn label_world_position(&self) -> Option<Vec3> {
        if !self.label.is_visible() {
            return None;
        }
        Some(self.globe_frame().apply(self.label.anchor()))
    }

    fn globe_frame(&self) -> Transform {
        self.globe
            .and_then(|g| self.node(g.globe))
            .map(|n| n.transform)
            .unwrap_or_else(Transform::identity)
    }

    /// Compose parent transforms up to the root.
    pub fn world_transform(&self, id: NodeId) -> Option<Transform> {
        let node = self.node(id)?;
        let mut world = node.transform;
        let mut parent = node.parent;
        // Bounded by node count so a malformed parent chain cannot spin.
        for _ in 0..self.nodes.len() {
            let Some(pid) = parent else {
                break;
            };
            let Some(p) = self.node(pid) else {
                break;
            };
            world = world.then_parent(&p.transform);
            parent = p.parent;
        }
        Some(world)
    }

    fn is_visible(&self, id: NodeId) -> bool {
        let mut effective = Visibility::visible();
        let mut current = Some(id);
        // Bounded walk so a corrupt parent chain cannot spin forever.
        for _ in 0..=self.nodes.len() {
            let Some(cid) = current else {
                return effective.visible;
            };
            let Some(n) = self.node(cid) else {
                return false;
            };
            effective = effective.under(n.visibility);
            if !effective.visible {
                return false;
            }
            current = n.parent;
        }
        effective.visible
    }

    /// Visible drawables with world transforms, in node order.
    pub fn drawables(&self) -> Vec<(NodeId, Transform, &Drawable3D)> {
        let mut out = Vec::new();
        for (idx, slot) in self.nodes.iter().enumerate() {
            let Some(node) = slot else { continue };
            let Some(drawable) = node.drawable.as_ref() else {
                continue;
            };
            let id = NodeId(idx as u32);
            if !self.is_visible(id) {
                continue;
            }
            let Some(world) = self.world_transform(id) else {
                continue;
            };
            out.push((id, world, drawable));
        }
        out
    }

    /// Release every node, marker, light and label. Returns how many nodes were freed.
    pub fn release(&mut self) -> usize {
        let freed = self.node_count();
        self.nodes.clear();
        self.free.clear();
        self.globe = None;
        self.background = None;
        self.markers.clear();
        self.label = LabelOverlay::default();
        debug!(freed, "scene released");
        freed
    }
}

/// Borrowed view over the marker group: iteration and hit-testing.
#[derive(Debug, Copy, Clone)]
pub struct MarkerGroup<'a> {
    graph: &'a SceneGraph,
}

impl<'a> MarkerGroup<'a> {
    pub fn len(&self) -> usize {
        self.graph.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.markers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'a, Marker> {
        self.graph.markers.iter()
    }

    /// Marker center in world space (globe rotation applied).
    pub fn world_position(&self, id: MarkerId) -> Option<Vec3> {
        let marker = self.graph.markers.get(id.index())?;
        Some(self.graph.globe_frame().apply(marker.local_position))
    }

    /// World-space marker centers in insertion order.
    pub fn world_positions(&self) -> Vec<(MarkerId, Vec3)> {
        let frame = self.graph.globe_frame();
        self.graph
            .markers
            .iter()
            .map(|m| (m.id, frame.apply(m.local_position)))
            .collect()
    }

    pub fn hit_test(&self, ray: Ray) -> Option<PickHit> {
        pick_markers(self, ray, self.graph.marker_style.radius)
    }

    pub fn find(&self, label: &str) -> Option<&'a Marker> {
        self.graph.markers.iter().find(|m| m.label() == label)
    }
}
