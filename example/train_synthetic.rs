use fcnet::prelude::*;
use fcnet::core::write_matrix_to_csv;

// Two Gaussian blobs, one per class. The SGD loop below lives outside the
// library: it reads the gradients and writes the public parameter fields.
fn main() -> Result<()> {
    let n_per_class = 100;
    let centers = [[-1.0, -1.0], [1.0, 1.0]];
    let noise = Normal::new(0.0, 0.4).unwrap();
    let mut rng = StdRng::seed_from_u64(0);

    let mut x = Array2::<f64>::zeros((2 * n_per_class, 2));
    let mut y = Array1::<usize>::zeros(2 * n_per_class);
    for (i, mut row) in x.outer_iter_mut().enumerate() {
        let class = i / n_per_class;
        row[0] = centers[class][0] + noise.sample(&mut rng);
        row[1] = centers[class][1] + noise.sample(&mut rng);
        y[i] = class;
    }

    let config = NetConfig {
        hidden_dims: vec![16, 16],
        input_dim: 2,
        num_classes: 2,
        weight_scale: 1e-1,
        reg: 1e-3,
        dropout: None,
        batchnorm: false,
        seed: Some(42),
    };
    let mut model = FullyConnectedNet::new(config)?;
    model.summary();

    let lr = 0.5;
    let epochs = 200;
    for epoch in 0..epochs {
        let (loss, grads) = model.loss(&x, &y)?;
        for (layer, grad) in model.layers.iter_mut().zip(grads.iter()) {
            layer.w.scaled_add(-lr, &grad.dw);
            layer.b.scaled_add(-lr, &grad.db);
        }
        if epoch % 20 == 0 {
            println!("Epoch: {}/{} loss: {:?}", epoch, epochs, loss);
        }
    }

    let scores = model.predict(&x)?;
    let predicted: Vec<usize> = scores
        .outer_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
                    if v > bv {
                        (i, v)
                    } else {
                        (bi, bv)
                    }
                })
                .0
        })
        .collect();
    let correct = predicted.iter().zip(y.iter()).filter(|(p, y)| p == y).count();

    println!("Evaluation...");
    println!("Training accuracy: {:.3}", correct as f64 / y.len() as f64);
    println!("Test-mode loss: {:?}", model.evaluate(&x, &y)?);

    model.save("./blobs.model")?;
    write_matrix_to_csv(&model.layers[0].w, "./w1.csv")?;

    Ok(())
}
