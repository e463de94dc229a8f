//! Basic procedural mesh generation routines.
use crate::error::{FieldError, Result};
use crate::mesh::{ElementId, Mesh, NodeId};
use nalgebra::DVector;

/// A generated mesh together with the rectangular Cartesian position of every node.
#[derive(Debug, Clone, PartialEq)]
pub struct ProceduralMesh {
    pub mesh: Mesh,
    pub node_positions: Vec<DVector<f64>>,
    pub cells: Vec<ElementId>,
}

/// Generates an axis-aligned box `[0, extents[0]] x ...` of `cells[k]` uniform cells per axis.
///
/// The dimension of the mesh is the number of entries in `extents`. Nodes and cells are numbered
/// with the first axis varying fastest.
pub fn create_rectangular_uniform_mesh(extents: &[f64], cells: &[usize]) -> Result<ProceduralMesh> {
    let dim = extents.len();
    if dim == 0 || dim > 3 || cells.len() != dim {
        return Err(FieldError::invalid_argument("extents and cell counts must have 1 to 3 matching entries"));
    }
    if cells.iter().any(|&n| n == 0) {
        return Err(FieldError::invalid_argument("cell counts must be positive"));
    }

    let nodes_per_axis: Vec<usize> = cells.iter().map(|n| n + 1).collect();
    let node_strides = strides(&nodes_per_axis);
    let number_of_nodes: usize = nodes_per_axis.iter().product();

    let node_positions = (0..number_of_nodes)
        .map(|node| {
            DVector::from_fn(dim, |k, _| {
                let index = (node / node_strides[k]) % nodes_per_axis[k];
                extents[k] * index as f64 / cells[k] as f64
            })
        })
        .collect();

    let cell_strides = strides(cells);
    let number_of_cells: usize = cells.iter().product();
    let mut mesh = Mesh::new();
    let mut cell_ids = Vec::with_capacity(number_of_cells);
    for cell in 0..number_of_cells {
        let origin: usize = (0..dim)
            .map(|k| ((cell / cell_strides[k]) % cells[k]) * node_strides[k])
            .sum();
        let nodes = (0..1usize << dim)
            .map(|corner| {
                let offset: usize = (0..dim)
                    .filter(|&k| corner & (1 << k) != 0)
                    .map(|k| node_strides[k])
                    .sum();
                NodeId(origin + offset)
            })
            .collect();
        cell_ids.push(mesh.add_cell(nodes)?);
    }

    Ok(ProceduralMesh {
        mesh,
        node_positions,
        cells: cell_ids,
    })
}

/// A single cube element spanning `[0, 1]^3`, whose coordinates coincide with its xi.
pub fn create_unit_cube_mesh() -> ProceduralMesh {
    create_rectangular_uniform_mesh(&[1.0, 1.0, 1.0], &[1, 1, 1]).expect("Unit cube arguments are valid")
}

fn strides(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(1, |stride, &count| {
            let current = *stride;
            *stride *= count;
            Some(current)
        })
        .collect()
}
