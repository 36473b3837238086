use crate::prelude::*;

/// Softmax cross-entropy over a batch of class scores.
///
/// Returns the mean negative log-likelihood of the correct classes together
/// with the gradient of that loss with respect to `scores`. Rows are shifted
/// by their maximum before exponentiation.
pub fn softmax_loss<A: NdFloat>(scores: &Array2<A>, y: &Array1<usize>) -> Result<(A, Array2<A>)> {
    let (n, num_classes) = scores.dim();
    if y.len() != n {
        return Err(NNError::ShapeMismatch(format!(
            "{} score rows but {} labels",
            n,
            y.len()
        )));
    }
    if n == 0 {
        return Err(NNError::ShapeMismatch(
            "cannot average loss over an empty batch".to_string(),
        ));
    }
    for &label in y.iter() {
        if label >= num_classes {
            return Err(NNError::LabelOutOfRange { label, num_classes });
        }
    }

    let nf = A::from(n).unwrap();
    let mut probs = scores.clone();
    for mut row in probs.outer_iter_mut() {
        let max = row.fold(A::neg_infinity(), |m, &v| A::max(m, v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }

    let mut loss = A::zero();
    for (i, &label) in y.iter().enumerate() {
        loss = loss - probs[[i, label]].ln();
    }
    loss = loss / nf;

    // d(loss)/d(scores) = (probs - one_hot(y)) / n
    let mut dscores = probs;
    for (i, &label) in y.iter().enumerate() {
        dscores[[i, label]] = dscores[[i, label]] - A::one();
    }
    dscores.mapv_inplace(|v| v / nf);

    Ok((loss, dscores))
}

/// L2 penalty: 0.5 * reg * sum of squared entries, over weight matrices only.
pub fn l2_regularization<A: NdFloat>(reg: A, weights: &[&Array2<A>]) -> A {
    let sum = weights
        .iter()
        .map(|w| w.mapv(|x| x.powi(2)).sum())
        .fold(A::zero(), |acc, s| acc + s);
    A::from(0.5).unwrap() * reg * sum
}
