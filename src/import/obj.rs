use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use log::{debug, warn};

use super::{
    ImportError, ImportSlot, ImportedMaterial, ImportedMesh, ImportedScene, SceneImporter,
    SceneNode,
};

const DEFAULT_MATERIAL: &str = "DefaultMaterial";
const DEFAULT_GROUP: &str = "default";

/// Wavefront OBJ importer with MTL material support.
///
/// Polygons are fan-triangulated, UVs are flipped vertically by default and
/// tangent space is derived from the UV layout. Every `o`/`g` group becomes a
/// child of the root node, holding one mesh per material it uses.
#[derive(Debug, Clone, Copy)]
pub struct ObjImporter {
    flip_uvs: bool,
}

impl Default for ObjImporter {
    fn default() -> Self {
        Self { flip_uvs: true }
    }
}

impl ObjImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flip_uvs(mut self, flip_uvs: bool) -> Self {
        self.flip_uvs = flip_uvs;
        self
    }

    /// Parses OBJ text. Material libraries are listed in the result but not
    /// read; [`SceneImporter::import`] resolves them next to the file.
    pub fn parse_str(&self, data: &str, source: &Path) -> Result<ParsedObj, ImportError> {
        let mut positions = Vec::new();
        let mut tex_coords = Vec::new();
        let mut normals = Vec::new();
        let mut groups = vec![Group::new(DEFAULT_GROUP)];
        let mut material: Option<String> = None;
        let mut material_libs = Vec::new();

        for (line_no, line) in data.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut parts = trimmed.split_whitespace();
            let Some(tag) = parts.next() else {
                continue;
            };
            let fail = |message: String| ImportError::Parse {
                path: source.to_path_buf(),
                line: line_no + 1,
                message,
            };
            match tag {
                "v" => {
                    let position =
                        parse_vec3(parts).map_err(|e| fail(format!("invalid vertex: {e}")))?;
                    positions.push(position);
                }
                "vn" => {
                    let normal =
                        parse_vec3(parts).map_err(|e| fail(format!("invalid normal: {e}")))?;
                    normals.push(normal);
                }
                "vt" => {
                    let uv = parse_vec2(parts)
                        .map_err(|e| fail(format!("invalid texture coordinate: {e}")))?;
                    tex_coords.push(uv);
                }
                "f" => {
                    let defined = [positions.len(), tex_coords.len(), normals.len()];
                    let polygon = parse_face(parts, defined)
                        .map_err(|e| fail(format!("invalid face: {e}")))?;
                    if let Some(group) = groups.last_mut() {
                        triangulate_face(&polygon, group.bucket(material.as_deref()));
                    }
                }
                "o" | "g" => {
                    let name = parts.collect::<Vec<_>>().join(" ");
                    let name = if name.is_empty() { DEFAULT_GROUP.to_string() } else { name };
                    match groups.last_mut() {
                        Some(group) if group.is_empty() => group.name = name,
                        _ => groups.push(Group::new(&name)),
                    }
                }
                "usemtl" => {
                    let name = parts.collect::<Vec<_>>().join(" ");
                    material = (!name.is_empty()).then_some(name);
                }
                "mtllib" => material_libs.extend(parts.map(str::to_string)),
                _ => {}
            }
        }

        if positions.is_empty() {
            return Err(ImportError::Parse {
                path: source.to_path_buf(),
                line: 0,
                message: "OBJ file does not define any vertices".into(),
            });
        }

        let sources = Sources {
            positions: &positions,
            tex_coords: &tex_coords,
            normals: &normals,
        };
        let mut meshes = Vec::new();
        let mut nodes = Vec::new();
        for group in groups.into_iter().filter(|group| !group.is_empty()) {
            let mut node = SceneNode::new(&group.name);
            for (material, faces) in group.buckets {
                let mut mesh = build_mesh(&sources, &faces, self.flip_uvs)
                    .map_err(|message| ImportError::Parse {
                        path: source.to_path_buf(),
                        line: 0,
                        message,
                    })?;
                mesh.name = group.name.clone();
                node.meshes.push(meshes.len());
                meshes.push((material, mesh));
            }
            nodes.push(node);
        }

        let root_name = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".into());
        let mut root = SceneNode::new(root_name);
        root.children = nodes;

        Ok(ParsedObj {
            meshes,
            root,
            material_libs,
        })
    }
}

impl SceneImporter for ObjImporter {
    fn import(&self, path: &Path) -> Result<ImportedScene, ImportError> {
        let is_obj = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("obj"));
        if !is_obj {
            return Err(ImportError::UnsupportedFormat(path.to_path_buf()));
        }
        let data = read_text(path)?;
        let parsed = self.parse_str(&data, path)?;

        let directory = path.parent().unwrap_or_else(|| Path::new(""));
        let mut materials = vec![ImportedMaterial::named(DEFAULT_MATERIAL)];
        for lib in &parsed.material_libs {
            match read_text(&directory.join(lib)) {
                Ok(text) => materials.extend(parse_mtl(&text)),
                Err(err) => warn!("{err}; continuing without its materials"),
            }
        }

        let lookup: HashMap<&str, usize> = materials
            .iter()
            .enumerate()
            .map(|(index, material)| (material.name.as_str(), index))
            .collect();

        let meshes = parsed
            .meshes
            .into_iter()
            .map(|(material, mut mesh)| {
                mesh.material_index = match material.as_deref() {
                    None => 0,
                    Some(name) => lookup.get(name).copied().unwrap_or_else(|| {
                        warn!("material {name} is not defined in any material library");
                        0
                    }),
                };
                mesh
            })
            .collect::<Vec<_>>();

        debug!(
            "imported {} mesh(es) and {} material(s) from {}",
            meshes.len(),
            materials.len(),
            path.display()
        );

        Ok(ImportedScene {
            meshes,
            materials,
            root: Some(parsed.root),
            incomplete: false,
        })
    }
}

/// OBJ geometry before materials are resolved.
#[derive(Debug, Clone)]
pub struct ParsedObj {
    /// Meshes with the material name selected by `usemtl`.
    pub meshes: Vec<(Option<String>, ImportedMesh)>,
    pub root: SceneNode,
    pub material_libs: Vec<String>,
}

/// Parses MTL text into materials with their texture maps.
pub fn parse_mtl(data: &str) -> Vec<ImportedMaterial> {
    let mut materials: Vec<ImportedMaterial> = Vec::new();
    for line in data.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        if tag == "newmtl" {
            let name = parts.collect::<Vec<_>>().join(" ");
            materials.push(ImportedMaterial::named(name));
            continue;
        }
        let slot = match tag.to_ascii_lowercase().as_str() {
            "map_kd" => ImportSlot::Diffuse,
            "map_ks" => ImportSlot::Specular,
            "map_ka" => ImportSlot::Ambient,
            "map_bump" | "bump" => ImportSlot::Height,
            "norm" | "map_kn" => ImportSlot::Normals,
            "map_ns" => ImportSlot::Shininess,
            "map_d" => ImportSlot::Opacity,
            "disp" => ImportSlot::Displacement,
            _ => continue,
        };
        let Some(file) = map_file_name(parts) else {
            continue;
        };
        match materials.last_mut() {
            Some(material) => material.add_texture(slot, &file),
            None => warn!("texture map {file} appears before any newmtl statement"),
        }
    }
    materials
}

/// Skips the option flags of a map statement and joins the rest into the
/// file name, which may contain spaces.
fn map_file_name<'a>(parts: impl Iterator<Item = &'a str>) -> Option<String> {
    let tokens: Vec<&str> = parts.collect();
    let mut i = 0;
    while let Some(flag) = tokens.get(i) {
        let (required, optional) = match *flag {
            "-blendu" | "-blendv" | "-bm" | "-boost" | "-cc" | "-clamp" | "-imfchan"
            | "-texres" | "-type" => (1, 0),
            "-mm" => (2, 0),
            "-o" | "-s" | "-t" => (1, 2),
            _ => break,
        };
        i += 1 + required;
        for _ in 0..optional {
            match tokens.get(i) {
                Some(value) if value.parse::<f32>().is_ok() => i += 1,
                _ => break,
            }
        }
    }
    let name = tokens.get(i..)?.join(" ");
    (!name.is_empty()).then_some(name)
}

fn read_text(path: &Path) -> Result<String, ImportError> {
    fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: PathBuf::from(path),
        source,
    })
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3, String> {
    let mut next = || -> Result<f32, String> {
        parts
            .next()
            .ok_or_else(|| "missing vector component".to_string())?
            .parse::<f32>()
            .map_err(|err| err.to_string())
    };
    Ok(Vec3::new(next()?, next()?, next()?))
}

fn parse_vec2<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec2, String> {
    let u = parts
        .next()
        .ok_or_else(|| "missing texture coordinate".to_string())?
        .parse::<f32>()
        .map_err(|err| err.to_string())?;
    let v = match parts.next() {
        Some(v) => v.parse::<f32>().map_err(|err| err.to_string())?,
        None => 0.0,
    };
    Ok(Vec2::new(u, v))
}

/// Parses face corners, resolving relative indices against the `defined`
/// position, texture coordinate and normal counts seen so far.
fn parse_face<'a>(
    parts: impl Iterator<Item = &'a str>,
    defined: [usize; 3],
) -> Result<Vec<FaceIndex>, String> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let mut resolved = [None; 3];
        for (slot, count) in resolved.iter_mut().zip(defined) {
            let raw = match segments.next() {
                Some(s) if !s.is_empty() => s.parse::<i32>().map_err(|err| err.to_string())?,
                _ => 0,
            };
            *slot = fix_index(raw, count)?;
        }
        let [v, vt, vn] = resolved;
        let v = v.ok_or_else(|| "missing vertex index".to_string())?;
        indices.push(FaceIndex { v, vt, vn });
    }
    if indices.len() < 3 {
        return Err("faces must reference at least 3 vertices".into());
    }
    Ok(indices)
}

fn triangulate_face(polygon: &[FaceIndex], faces: &mut Vec<[FaceIndex; 3]>) {
    if polygon.len() < 3 {
        return;
    }
    for i in 1..(polygon.len() - 1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

#[derive(Debug)]
struct Group {
    name: String,
    buckets: Vec<(Option<String>, Vec<[FaceIndex; 3]>)>,
}

impl Group {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            buckets: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.buckets.iter().all(|(_, faces)| faces.is_empty())
    }

    fn bucket(&mut self, material: Option<&str>) -> &mut Vec<[FaceIndex; 3]> {
        let position = self
            .buckets
            .iter()
            .position(|(name, _)| name.as_deref() == material);
        let index = match position {
            Some(index) => index,
            None => {
                self.buckets.push((material.map(str::to_string), Vec::new()));
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[index].1
    }
}

struct Sources<'a> {
    positions: &'a [Vec3],
    tex_coords: &'a [Vec2],
    normals: &'a [Vec3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    tex_coord: Option<usize>,
    normal: Option<usize>,
}

/// Zero-based indices into the file's attribute lists.
#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: usize,
    vt: Option<usize>,
    vn: Option<usize>,
}

fn build_mesh(
    sources: &Sources<'_>,
    faces: &[[FaceIndex; 3]],
    flip_uvs: bool,
) -> Result<ImportedMesh, String> {
    let mut lookup: HashMap<Key, u32> = HashMap::new();
    let mut mesh = ImportedMesh::default();
    let mut uvs = Vec::new();
    let mut any_uv = false;
    let mut missing_normals = false;

    for face in faces {
        let mut triangle = Vec::with_capacity(3);
        for idx in face {
            let position = Some(idx.v)
                .filter(|&i| i < sources.positions.len())
                .ok_or_else(|| format!("invalid vertex index {}", idx.v + 1))?;
            let key = Key {
                position,
                tex_coord: idx.vt.filter(|&i| i < sources.tex_coords.len()),
                normal: idx.vn.filter(|&i| i < sources.normals.len()),
            };
            let next_index = mesh.positions.len() as u32;
            let entry = *lookup.entry(key).or_insert_with(|| {
                mesh.positions.push(sources.positions[position]);
                let normal = key.normal.map(|i| sources.normals[i]);
                missing_normals |= normal.is_none();
                mesh.normals.push(normal.unwrap_or(Vec3::ZERO));
                let uv = key.tex_coord.map(|i| {
                    let uv = sources.tex_coords[i];
                    if flip_uvs {
                        Vec2::new(uv.x, 1.0 - uv.y)
                    } else {
                        uv
                    }
                });
                any_uv |= uv.is_some();
                uvs.push(uv.unwrap_or(Vec2::ZERO));
                next_index
            });
            triangle.push(entry);
        }
        mesh.faces.push(triangle);
    }

    if any_uv {
        mesh.tex_coords = Some(uvs);
    }
    if missing_normals {
        compute_normals(&mut mesh);
    }
    compute_tangents(&mut mesh);
    Ok(mesh)
}

/// Converts a 1-based or negative OBJ index to a 0-based one. Negative
/// indices count back from the `defined` elements; 0 means absent.
fn fix_index(index: i32, defined: usize) -> Result<Option<usize>, String> {
    if index > 0 {
        Ok(Some(index as usize - 1))
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        if abs > defined {
            return Err(format!(
                "relative index {index} reaches past the {defined} element(s) defined so far"
            ));
        }
        Ok(Some(defined - abs))
    } else {
        Ok(None)
    }
}

fn triangle_indices(face: &[u32]) -> Option<[usize; 3]> {
    match face {
        [a, b, c] => Some([*a as usize, *b as usize, *c as usize]),
        _ => None,
    }
}

fn compute_normals(mesh: &mut ImportedMesh) {
    let mut accum = vec![Vec3::ZERO; mesh.positions.len()];
    for [i0, i1, i2] in mesh.faces.iter().filter_map(|face| triangle_indices(face)) {
        let (p0, p1, p2) = (mesh.positions[i0], mesh.positions[i1], mesh.positions[i2]);
        let normal = (p1 - p0).cross(p2 - p0);
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }
    for (normal, sum) in mesh.normals.iter_mut().zip(accum) {
        if *normal == Vec3::ZERO {
            *normal = sum.normalize_or_zero();
        }
    }
}

fn compute_tangents(mesh: &mut ImportedMesh) {
    let count = mesh.positions.len();
    mesh.tangents = vec![Vec3::ZERO; count];
    mesh.bitangents = vec![Vec3::ZERO; count];
    let Some(uvs) = mesh.tex_coords.as_ref() else {
        return;
    };

    for [i0, i1, i2] in mesh.faces.iter().filter_map(|face| triangle_indices(face)) {
        let edge1 = mesh.positions[i1] - mesh.positions[i0];
        let edge2 = mesh.positions[i2] - mesh.positions[i0];
        let duv1 = uvs[i1] - uvs[i0];
        let duv2 = uvs[i2] - uvs[i0];
        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (edge1 * duv2.y - edge2 * duv1.y) * r;
        let bitangent = (edge2 * duv1.x - edge1 * duv2.x) * r;
        for i in [i0, i1, i2] {
            mesh.tangents[i] += tangent;
            mesh.bitangents[i] += bitangent;
        }
    }

    for i in 0..count {
        let normal = mesh.normals[i];
        let tangent = mesh.tangents[i];
        mesh.tangents[i] = (tangent - normal * normal.dot(tangent)).normalize_or_zero();
        mesh.bitangents[i] = mesh.bitangents[i].normalize_or_zero();
    }
}
